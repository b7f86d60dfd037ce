//! Proptest generators for property-based testing.

use proptest::prelude::*;

use sealvault::{NewOrganization, ShareRecipient};
use sealvault_core::{AsymmetricKey, KeyMaterial, ObjectId, WrappedKey};

/// Generate a random ObjectId.
pub fn object_id() -> impl Strategy<Value = ObjectId> {
    any::<[u8; 12]>().prop_map(ObjectId::from_bytes)
}

/// Generate a well-formed email, possibly with mixed case and padding.
pub fn email() -> impl Strategy<Value = String> {
    ("[a-zA-Z][a-zA-Z0-9._]{0,15}", "[a-z]{1,10}\\.(test|example)", " {0,2}")
        .prop_map(|(local, domain, pad)| format!("{pad}{local}@{domain}{pad}"))
}

/// Generate an opaque non-empty token standing in for ciphertext.
pub fn ciphertext() -> impl Strategy<Value = String> {
    "[A-Za-z0-9+/]{8,64}={0,2}".prop_map(String::from)
}

pub fn algorithm() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("AES-GCM".to_string()),
        Just("XChaCha20-Poly1305".to_string()),
        Just("RSA-OAEP".to_string()),
    ]
}

pub fn wrapped_key() -> impl Strategy<Value = WrappedKey> {
    (ciphertext(), algorithm()).prop_map(|(c, a)| WrappedKey::new(c, a))
}

/// Generate well-formed key material of either variant.
pub fn key_material() -> impl Strategy<Value = KeyMaterial> {
    prop_oneof![
        wrapped_key().prop_map(KeyMaterial::Symmetric),
        (ciphertext(), ciphertext(), algorithm())
            .prop_map(|(p, w, a)| KeyMaterial::Asymmetric(AsymmetricKey::new(p, w, a))),
    ]
}

/// Generate a valid organization-create input.
pub fn new_organization() -> impl Strategy<Value = NewOrganization> {
    (
        "[A-Z][a-z]{2,12}",
        proptest::option::of(email()),
        email(),
        key_material(),
    )
        .prop_map(|(name, billing_email, admin_email, key_material)| NewOrganization {
            name,
            billing_email,
            admin_email,
            key_material,
        })
}

/// Generate share recipients whose ids are well-formed.
pub fn recipients(max: usize) -> impl Strategy<Value = Vec<ShareRecipient>> {
    prop::collection::vec(
        (object_id(), ciphertext()).prop_map(|(id, encrypted_data)| ShareRecipient {
            user_id: id.to_hex(),
            role: "shared".to_string(),
            encrypted_data,
        }),
        0..=max,
    )
}
