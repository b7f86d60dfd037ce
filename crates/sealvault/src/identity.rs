//! Identity operations: users and their organization memberships.

use std::collections::HashSet;

use sealvault_core::{
    AsymmetricKey, Email, ObjectId, Organization, OrganizationMembership, Pagination,
    PasswordHash, User, WrappedKey,
};
use sealvault_store::{Store, StoreError, UpdateResult};

use crate::error::{store_failure, Result, VaultError};
use crate::vault::{collect_cursor, now, Vault};

/// Signup input.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: PasswordHash,
    pub symmetric_key: WrappedKey,
    pub asymmetric_key: AsymmetricKey,
    pub memberships: Vec<OrganizationMembership>,
}

impl<S: Store> Vault<S> {
    // ─────────────────────────────────────────────────────────────────────────
    // Identity Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a user.
    ///
    /// An email that is already taken fails with `InvalidEmail`. Repeated
    /// memberships for one organization keep only the first entry.
    pub async fn create_user(&self, new: NewUser) -> Result<User> {
        new.password_hash.validate()?;
        let email = Email::parse(&new.email)?;
        new.symmetric_key.validate()?;
        new.asymmetric_key.validate()?;
        for membership in &new.memberships {
            membership.wrapped_org_key.validate()?;
        }

        let mut seen = HashSet::new();
        let memberships: Vec<OrganizationMembership> = new
            .memberships
            .into_iter()
            .filter(|m| seen.insert(m.organization_id))
            .collect();

        let at = now();
        let user = User {
            id: ObjectId::generate(),
            name: new.name.trim().to_string(),
            email,
            password_hash: new.password_hash,
            symmetric_key: new.symmetric_key,
            asymmetric_key: new.asymmetric_key,
            is_blacklisted: false,
            memberships,
            created_at: at,
            updated_at: at,
        };

        match self.store.insert_user(&user).await {
            Ok(()) => Ok(user),
            Err(StoreError::Duplicate(_)) => {
                tracing::debug!(email = %user.email, "email already registered");
                Err(VaultError::InvalidEmail(user.email.to_string()))
            }
            Err(err) => Err(store_failure("create_user", err)),
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<User> {
        let email = Email::parse(email)?;
        self.store
            .find_user_by_email(&email)
            .await
            .map_err(|e| store_failure("find_user_by_email", e))?
            .ok_or(VaultError::UserNotFound)
    }

    pub async fn find_user_by_id(&self, id: &str) -> Result<User> {
        let id = ObjectId::parse(id)?;
        self.store
            .find_user_by_id(&id)
            .await
            .map_err(|e| store_failure("find_user_by_id", e))?
            .ok_or(VaultError::UserNotFound)
    }

    /// Append a membership to the user with this email.
    ///
    /// Appending a second membership for the same organization is a no-op
    /// (`modified_count == 0`).
    pub async fn append_membership(
        &self,
        email: &str,
        membership: OrganizationMembership,
    ) -> Result<UpdateResult> {
        let email = Email::parse(email)?;
        membership.wrapped_org_key.validate()?;
        self.store
            .push_membership(&email, &membership)
            .await
            .map_err(|e| store_failure("append_membership", e))
    }

    /// Remove an organization's membership from every user holding it.
    pub async fn remove_memberships_by_org(&self, organization_id: &str) -> Result<UpdateResult> {
        let org_id = ObjectId::parse(organization_id)?;
        self.store
            .pull_memberships(&org_id)
            .await
            .map_err(|e| store_failure("remove_memberships_by_org", e))
    }

    /// Members of an organization. Undecodable records are skipped.
    pub async fn list_users_by_organization(
        &self,
        organization_id: &str,
        pagination: Pagination,
    ) -> Result<Vec<User>> {
        let org_id = ObjectId::parse(organization_id)?;
        let cursor = self
            .store
            .find_users_by_organization(&org_id, &self.find_options(pagination))
            .await
            .map_err(|e| store_failure("list_users_by_organization", e))?;
        Ok(collect_cursor("list_users_by_organization", cursor))
    }

    /// The organizations a user belongs to, in membership order.
    ///
    /// Memberships pointing at deleted organizations are dropped.
    pub async fn organizations_for_user(&self, user_id: &str) -> Result<Vec<Organization>> {
        let user = self.find_user_by_id(user_id).await?;
        let cursor = self
            .store
            .find_organizations(&user.organization_ids())
            .await
            .map_err(|e| store_failure("organizations_for_user", e))?;

        let organizations = collect_cursor("organizations_for_user", cursor);
        if organizations.len() < user.memberships.len() {
            tracing::debug!(
                user_id = %user.id,
                dangling = user.memberships.len() - organizations.len(),
                "user has memberships for missing organizations"
            );
        }
        Ok(organizations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultConfig;
    use sealvault_store::MemoryStore;

    fn vault() -> Vault<MemoryStore> {
        Vault::new(MemoryStore::new(), VaultConfig::default())
    }

    fn signup(email: &str) -> NewUser {
        NewUser {
            name: "Alice".into(),
            email: email.into(),
            password_hash: PasswordHash::new("$argon2id$...", "argon2id"),
            symmetric_key: WrappedKey::new("sym", "AES-GCM"),
            asymmetric_key: AsymmetricKey::new("pub", "wrapped-priv", "RSA-OAEP"),
            memberships: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let vault = vault();
        let user = vault.create_user(signup(" Alice@Acme.test ")).await.unwrap();
        assert_eq!(user.email.as_str(), "alice@acme.test");
        assert!(!user.is_blacklisted);

        let by_email = vault.find_user_by_email("ALICE@ACME.TEST").await.unwrap();
        assert_eq!(by_email.id, user.id);

        let by_id = vault.find_user_by_id(&user.id.to_hex()).await.unwrap();
        assert_eq!(by_id.email, user.email);
    }

    #[tokio::test]
    async fn test_duplicate_signup_is_invalid_email() {
        let vault = vault();
        vault.create_user(signup("alice@acme.test")).await.unwrap();
        let err = vault.create_user(signup("ALICE@acme.test")).await.unwrap_err();
        assert!(matches!(err, VaultError::InvalidEmail(_)));
    }

    #[tokio::test]
    async fn test_signup_validation() {
        let vault = vault();

        let mut bad = signup("alice@acme.test");
        bad.password_hash = PasswordHash::new("", "argon2id");
        assert_eq!(
            vault.create_user(bad).await.unwrap_err(),
            VaultError::InvalidPasswordHash
        );

        let err = vault.create_user(signup("not-an-email")).await.unwrap_err();
        assert!(matches!(err, VaultError::InvalidEmail(_)));

        let mut bad = signup("alice@acme.test");
        bad.asymmetric_key.wrapped_private_key.clear();
        assert!(matches!(
            vault.create_user(bad).await.unwrap_err(),
            VaultError::InvalidKeyMaterial(_)
        ));
    }

    #[tokio::test]
    async fn test_lookup_errors() {
        let vault = vault();
        assert_eq!(
            vault.find_user_by_id("not-hex").await.unwrap_err(),
            VaultError::InvalidId("not-hex".into())
        );
        assert_eq!(
            vault
                .find_user_by_id(&ObjectId::generate().to_hex())
                .await
                .unwrap_err(),
            VaultError::UserNotFound
        );
        assert_eq!(
            vault.find_user_by_email("nobody@acme.test").await.unwrap_err(),
            VaultError::UserNotFound
        );
    }

    #[tokio::test]
    async fn test_append_membership_twice_keeps_one_entry() {
        let vault = vault();
        let user = vault.create_user(signup("alice@acme.test")).await.unwrap();
        let membership =
            OrganizationMembership::member(ObjectId::generate(), WrappedKey::new("k", "AES-GCM"));

        let first = vault
            .append_membership("alice@acme.test", membership.clone())
            .await
            .unwrap();
        let second = vault
            .append_membership("alice@acme.test", membership)
            .await
            .unwrap();
        assert_eq!((first.modified_count, second.modified_count), (1, 0));

        let user = vault.find_user_by_id(&user.id.to_hex()).await.unwrap();
        assert_eq!(user.memberships.len(), 1);
    }

    #[tokio::test]
    async fn test_list_users_by_organization() {
        let vault = vault();
        let org = ObjectId::generate();
        let key = WrappedKey::new("k", "AES-GCM");

        for email in ["a@acme.test", "b@acme.test", "c@acme.test"] {
            vault.create_user(signup(email)).await.unwrap();
            vault
                .append_membership(email, OrganizationMembership::member(org, key.clone()))
                .await
                .unwrap();
        }
        vault.create_user(signup("outsider@acme.test")).await.unwrap();

        let all = vault
            .list_users_by_organization(&org.to_hex(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let page = vault
            .list_users_by_organization(&org.to_hex(), vault.pagination(Some(2), Some(2)))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
    }
}
