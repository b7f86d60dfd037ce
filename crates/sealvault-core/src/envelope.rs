//! Envelope key material.
//!
//! Every key the engine handles is already wrapped by a client. These types
//! only carry the opaque blobs and check that the required fields are
//! present; they never inspect the ciphertext.

use serde::{Deserialize, Serialize};

use crate::error::{KeyField, ValidationError};

/// A symmetric key encrypted under another key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    /// The wrapped key bytes, in whatever text encoding the client chose.
    pub ciphertext: String,
    /// Algorithm identifier chosen by the client.
    pub algorithm: String,
}

impl WrappedKey {
    pub fn new(ciphertext: impl Into<String>, algorithm: impl Into<String>) -> Self {
        Self {
            ciphertext: ciphertext.into(),
            algorithm: algorithm.into(),
        }
    }

    /// Both ciphertext and algorithm must be present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require(&self.ciphertext, KeyField::Ciphertext)?;
        require(&self.algorithm, KeyField::Algorithm)
    }
}

/// An asymmetric key pair whose private half is wrapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsymmetricKey {
    pub public_key: String,
    pub wrapped_private_key: String,
    pub algorithm: String,
}

impl AsymmetricKey {
    pub fn new(
        public_key: impl Into<String>,
        wrapped_private_key: impl Into<String>,
        algorithm: impl Into<String>,
    ) -> Self {
        Self {
            public_key: public_key.into(),
            wrapped_private_key: wrapped_private_key.into(),
            algorithm: algorithm.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require(&self.public_key, KeyField::PublicKey)?;
        require(&self.wrapped_private_key, KeyField::WrappedPrivateKey)?;
        require(&self.algorithm, KeyField::Algorithm)
    }
}

/// A password hash computed client-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordHash {
    pub hash: String,
    pub algorithm: String,
}

impl PasswordHash {
    pub fn new(hash: impl Into<String>, algorithm: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            algorithm: algorithm.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.hash.trim().is_empty() || self.algorithm.trim().is_empty() {
            return Err(ValidationError::InvalidPasswordHash);
        }
        Ok(())
    }
}

/// An organization's master key.
///
/// Exactly one variant is chosen when the organization is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeyMaterial {
    Symmetric(WrappedKey),
    Asymmetric(AsymmetricKey),
}

impl KeyMaterial {
    /// Check that every field of the chosen variant is present.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            KeyMaterial::Symmetric(key) => key.validate(),
            KeyMaterial::Asymmetric(key) => key.validate(),
        }
    }

    pub fn algorithm(&self) -> &str {
        match self {
            KeyMaterial::Symmetric(key) => &key.algorithm,
            KeyMaterial::Asymmetric(key) => &key.algorithm,
        }
    }

    pub fn is_symmetric(&self) -> bool {
        matches!(self, KeyMaterial::Symmetric(_))
    }
}

fn require(value: &str, field: KeyField) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::InvalidKeyMaterial { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_key_requires_both_fields() {
        assert!(WrappedKey::new("c2VjcmV0", "AES-GCM").validate().is_ok());
        assert_eq!(
            WrappedKey::new("", "AES-GCM").validate(),
            Err(ValidationError::InvalidKeyMaterial {
                field: KeyField::Ciphertext
            })
        );
        assert_eq!(
            WrappedKey::new("c2VjcmV0", " ").validate(),
            Err(ValidationError::InvalidKeyMaterial {
                field: KeyField::Algorithm
            })
        );
    }

    #[test]
    fn test_asymmetric_variant_checks_every_field() {
        let missing_private = KeyMaterial::Asymmetric(AsymmetricKey::new("pub", "", "RSA-OAEP"));
        assert_eq!(
            missing_private.validate(),
            Err(ValidationError::InvalidKeyMaterial {
                field: KeyField::WrappedPrivateKey
            })
        );

        let ok = KeyMaterial::Asymmetric(AsymmetricKey::new("pub", "priv", "RSA-OAEP"));
        assert!(ok.validate().is_ok());
        assert_eq!(ok.algorithm(), "RSA-OAEP");
        assert!(!ok.is_symmetric());
    }

    #[test]
    fn test_key_material_is_tagged() {
        let key = KeyMaterial::Symmetric(WrappedKey::new("abc", "AES-GCM"));
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(json["kind"], "symmetric");
        assert_eq!(json["ciphertext"], "abc");
    }

    #[test]
    fn test_password_hash() {
        assert!(PasswordHash::new("h", "argon2id").validate().is_ok());
        assert_eq!(
            PasswordHash::new("h", "").validate(),
            Err(ValidationError::InvalidPasswordHash)
        );
    }
}
