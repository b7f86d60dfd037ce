//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use chrono::{Duration, Utc};

use sealvault::{
    NewInvite, NewOrganization, NewSecret, NewUser, OrganizationCreated, ShareRecipient, Vault,
    VaultConfig,
};
use sealvault_core::{
    AsymmetricKey, Invite, KeyMaterial, ObjectId, PasswordHash, Secret, User, WrappedKey,
};
use sealvault_store::{MemoryStore, Store};

/// Signup input with placeholder key material.
pub fn new_user(email: &str) -> NewUser {
    let name = email.split('@').next().unwrap_or(email).to_string();
    NewUser {
        name,
        email: email.to_string(),
        password_hash: PasswordHash::new(format!("hash-of-{}", email), "argon2id"),
        symmetric_key: WrappedKey::new(format!("sym-{}", email), "AES-GCM"),
        asymmetric_key: AsymmetricKey::new(
            format!("pub-{}", email),
            format!("priv-{}", email),
            "RSA-OAEP",
        ),
        memberships: Vec::new(),
    }
}

/// Organization input with a symmetric master key.
pub fn new_organization(name: &str, admin_email: &str) -> NewOrganization {
    NewOrganization {
        name: name.to_string(),
        billing_email: Some(format!("billing@{}.test", name.to_lowercase())),
        admin_email: admin_email.to_string(),
        key_material: KeyMaterial::Symmetric(WrappedKey::new(
            format!("{}-master-key", name),
            "AES-GCM",
        )),
    }
}

/// Secret input owned by `owner` in `organization`.
pub fn new_secret(owner: &ObjectId, organization: &ObjectId, name: &str) -> NewSecret {
    NewSecret {
        encrypted_data: format!("{}-for-{}", name, owner),
        owner_id: owner.to_hex(),
        role: "owner".to_string(),
        name: name.to_string(),
        description: format!("{} description", name),
        tags: ["test".to_string()].into_iter().collect(),
        creator_email: "creator@acme.test".to_string(),
        kind: "password".to_string(),
        organization_id: organization.to_hex(),
        expires_at: None,
    }
}

/// The organization key wrapped for one user.
pub fn wrapped_for(email: &str) -> WrappedKey {
    WrappedKey::new(format!("org-key-for-{}", email), "RSA-OAEP")
}

/// A share recipient whose ciphertext names them, so tests can tell the
/// copies apart.
pub fn recipient(user_id: &str) -> ShareRecipient {
    ShareRecipient {
        user_id: user_id.to_string(),
        role: "shared".to_string(),
        encrypted_data: format!("ciphertext-for-{}", user_id),
    }
}

/// A vault over a store with helpers for seeding it.
pub struct TestFixture<S: Store = MemoryStore> {
    pub vault: Vault<S>,
}

impl TestFixture<MemoryStore> {
    /// Create a fixture over an empty in-memory store.
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

impl Default for TestFixture<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Store> TestFixture<S> {
    pub fn with_store(store: S) -> Self {
        Self {
            vault: Vault::new(store, VaultConfig::default()),
        }
    }

    pub fn store(&self) -> &S {
        self.vault.store()
    }

    /// Register a user.
    pub async fn user(&self, email: &str) -> User {
        self.vault
            .create_user(new_user(email))
            .await
            .unwrap_or_else(|e| panic!("failed to register {}: {}", email, e))
    }

    /// Register `admin_email` and create an organization they administer.
    pub async fn organization(&self, name: &str, admin_email: &str) -> OrganizationCreated {
        if self.vault.find_user_by_email(admin_email).await.is_err() {
            self.user(admin_email).await;
        }
        self.vault
            .create_organization(new_organization(name, admin_email), wrapped_for(admin_email))
            .await
            .unwrap_or_else(|e| panic!("failed to create {}: {}", name, e))
    }

    /// Send an invite that expires `ttl` from now (negative for expired).
    pub async fn invite(&self, organization: &ObjectId, to_email: &str, ttl: Duration) -> Invite {
        self.vault
            .send_invite(NewInvite {
                from_email: "admin@acme.test".to_string(),
                to_email: to_email.to_string(),
                organization_id: organization.to_hex(),
                expires_at: Some(Utc::now() + ttl),
                wrapped_key: wrapped_for(to_email),
            })
            .await
            .unwrap_or_else(|e| panic!("failed to invite {}: {}", to_email, e))
    }

    /// Create an original secret.
    pub async fn secret(&self, owner: &ObjectId, organization: &ObjectId, name: &str) -> Secret {
        self.vault
            .create_secret(new_secret(owner, organization, name))
            .await
            .unwrap_or_else(|e| panic!("failed to create secret {}: {}", name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealvault::MembershipLink;

    #[tokio::test]
    async fn test_fixture_seeds_admin_membership() {
        let fixture = TestFixture::new();
        let created = fixture.organization("Acme", "admin@acme.test").await;
        assert_eq!(created.admin_membership, MembershipLink::Attached);

        let admin = fixture
            .vault
            .find_user_by_email("admin@acme.test")
            .await
            .unwrap();
        assert!(admin.membership(&created.organization.id).unwrap().is_admin);
    }

    #[tokio::test]
    async fn test_fixture_reuses_existing_admin() {
        let fixture = TestFixture::new();
        let first = fixture.organization("Acme", "admin@acme.test").await;
        let second = fixture.organization("Globex", "admin@acme.test").await;

        let admin = fixture
            .vault
            .find_user_by_email("admin@acme.test")
            .await
            .unwrap();
        assert_eq!(
            admin.organization_ids(),
            vec![first.organization.id, second.organization.id]
        );
    }
}
