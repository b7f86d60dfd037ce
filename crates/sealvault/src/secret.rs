//! Secrets and the sharing engine.
//!
//! Sharing fans one original out to N recipients. Each recipient is
//! verified independently and tolerates failure on its own; the copies for
//! all verified recipients are then written in a single atomic batch.
//!
//! The engine never derives ciphertext. Every recipient arrives with
//! ciphertext the caller already wrapped for that recipient, and each copy
//! stores exactly that.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;

use sealvault_core::{Email, ObjectId, Pagination, Secret, SecretUser};
use sealvault_store::{SecretFilter, Store};

use crate::error::{store_failure, PayloadField, Result, VaultError};
use crate::vault::{collect_cursor, now, Vault};

/// Role given to the owner of a newly created secret when none is supplied.
pub const OWNER_ROLE: &str = "owner";

/// Input for creating a secret.
#[derive(Debug, Clone)]
pub struct NewSecret {
    pub encrypted_data: String,
    pub owner_id: String,
    pub role: String,
    pub name: String,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub creator_email: String,
    pub kind: String,
    pub organization_id: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// One recipient of a share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRecipient {
    /// Wire id of the recipient user.
    pub user_id: String,
    pub role: String,
    /// The secret's ciphertext wrapped for this recipient.
    pub encrypted_data: String,
}

/// Result of a share.
#[derive(Debug, Clone, Default)]
pub struct ShareOutcome {
    /// Per-recipient status keyed by the id exactly as supplied.
    pub results: BTreeMap<String, bool>,
    /// The copies written, one per `true` entry.
    pub shared: Vec<Secret>,
}

impl<S: Store> Vault<S> {
    // ─────────────────────────────────────────────────────────────────────────
    // Secret Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an original secret.
    pub async fn create_secret(&self, new: NewSecret) -> Result<Secret> {
        if new.encrypted_data.trim().is_empty() {
            return Err(VaultError::InvalidPayload(PayloadField::Ciphertext));
        }
        if new.owner_id.trim().is_empty() {
            return Err(VaultError::InvalidPayload(PayloadField::Owner));
        }
        let creator_email = Email::parse(&new.creator_email)?;
        let owner_id = ObjectId::parse(&new.owner_id)?;
        let organization_id = ObjectId::parse(&new.organization_id)?;

        let role = match new.role.trim() {
            "" => OWNER_ROLE.to_string(),
            role => role.to_string(),
        };

        let at = now();
        let secret = Secret {
            id: ObjectId::generate(),
            encrypted_data: new.encrypted_data,
            user: SecretUser { id: owner_id, role },
            name: new.name,
            description: new.description,
            tags: new.tags,
            creator_email,
            kind: new.kind,
            organization_id,
            expires_at: new.expires_at,
            reference_key: None,
            created_at: at,
            updated_at: at,
        };

        self.store
            .insert_secret(&secret)
            .await
            .map_err(|e| store_failure("create_secret", e))?;
        Ok(secret)
    }

    pub async fn list_secrets_for_user(
        &self,
        user_id: &str,
        pagination: Pagination,
    ) -> Result<Vec<Secret>> {
        let filter = SecretFilter::default().owner(ObjectId::parse(user_id)?);
        self.list_secrets("list_secrets_for_user", filter, pagination)
            .await
    }

    pub async fn list_secrets_for_organization(
        &self,
        organization_id: &str,
        pagination: Pagination,
    ) -> Result<Vec<Secret>> {
        let filter = SecretFilter::default().organization(ObjectId::parse(organization_id)?);
        self.list_secrets("list_secrets_for_organization", filter, pagination)
            .await
    }

    pub async fn list_secrets_for_user_in_organization(
        &self,
        user_id: &str,
        organization_id: &str,
        pagination: Pagination,
    ) -> Result<Vec<Secret>> {
        let filter = SecretFilter::default()
            .owner(ObjectId::parse(user_id)?)
            .organization(ObjectId::parse(organization_id)?);
        self.list_secrets("list_secrets_for_user_in_organization", filter, pagination)
            .await
    }

    /// The copies shared from an original within an organization.
    pub async fn list_secret_shares(
        &self,
        organization_id: &str,
        original_id: &str,
        pagination: Pagination,
    ) -> Result<Vec<Secret>> {
        let filter = SecretFilter::default()
            .organization(ObjectId::parse(organization_id)?)
            .shared_from(ObjectId::parse(original_id)?);
        self.list_secrets("list_secret_shares", filter, pagination)
            .await
    }

    async fn list_secrets(
        &self,
        operation: &'static str,
        filter: SecretFilter,
        pagination: Pagination,
    ) -> Result<Vec<Secret>> {
        let cursor = self
            .store
            .find_secrets(&filter, &self.find_options(pagination))
            .await
            .map_err(|e| store_failure(operation, e))?;
        Ok(collect_cursor(operation, cursor))
    }
}

impl<S: Store + 'static> Vault<S> {
    /// Share a secret with a set of recipients.
    ///
    /// A recipient whose id is malformed, unknown, or whose lookup fails is
    /// reported `false` and skipped; the rest still receive their copy.
    /// Copies are written in one atomic batch: if that write fails the call
    /// fails with `ShareFailed` and no copy exists. A repeated recipient id
    /// is verified and copied once, using its first entry; later entries
    /// naming the same user, in any spelling, are dropped from the results.
    pub async fn share_secret(
        &self,
        original_id: &str,
        recipients: Vec<ShareRecipient>,
    ) -> Result<ShareOutcome> {
        let original_id = ObjectId::parse(original_id)?;
        if recipients
            .iter()
            .any(|r| r.encrypted_data.trim().is_empty())
        {
            return Err(VaultError::InvalidPayload(PayloadField::Ciphertext));
        }

        let original = self
            .store
            .find_secret(&original_id)
            .await
            .map_err(|e| store_failure("share_secret", e))?
            .ok_or(VaultError::SecretNotFound)?;

        // Spellings of one id (case, padding) collapse to their first entry.
        let mut seen_ids = HashSet::new();
        let mut seen_malformed = HashSet::new();
        let recipients: Vec<ShareRecipient> = recipients
            .into_iter()
            .filter(|r| match ObjectId::parse(&r.user_id) {
                Ok(id) => seen_ids.insert(id),
                Err(_) => seen_malformed.insert(r.user_id.clone()),
            })
            .collect();

        let verified = self.verify_recipients(&original_id, &recipients).await;

        let at = now();
        let mut results = BTreeMap::new();
        let mut copies = Vec::new();
        for (recipient, user_id) in recipients.into_iter().zip(verified) {
            let Some(user_id) = user_id else {
                results.insert(recipient.user_id, false);
                continue;
            };
            copies.push(original.share_copy(
                SecretUser {
                    id: user_id,
                    role: recipient.role,
                },
                recipient.encrypted_data,
                at,
            ));
            results.insert(recipient.user_id, true);
        }

        if copies.is_empty() {
            tracing::debug!(secret_id = %original_id, "no verified recipients; nothing shared");
            return Ok(ShareOutcome {
                results,
                shared: copies,
            });
        }

        if let Err(err) = self.store.insert_secrets(&copies).await {
            tracing::error!(
                secret_id = %original_id,
                copies = copies.len(),
                error = %err,
                "bulk insert of shared copies failed"
            );
            return Err(VaultError::ShareFailed);
        }

        Ok(ShareOutcome {
            results,
            shared: copies,
        })
    }

    /// Look up every recipient, at most `share_verification_concurrency`
    /// at a time. Returns the resolved user id per recipient, in order.
    async fn verify_recipients(
        &self,
        secret_id: &ObjectId,
        recipients: &[ShareRecipient],
    ) -> Vec<Option<ObjectId>> {
        let limit = self.config().share_verification_concurrency.max(1);
        let mut verified = vec![None; recipients.len()];
        let mut pending = recipients.iter().enumerate();
        let mut tasks = JoinSet::new();

        loop {
            while tasks.len() < limit {
                let Some((index, recipient)) = pending.next() else {
                    break;
                };
                let id = match ObjectId::parse(&recipient.user_id) {
                    Ok(id) => id,
                    Err(_) => {
                        tracing::debug!(
                            secret_id = %secret_id,
                            recipient = %recipient.user_id,
                            "malformed recipient id"
                        );
                        continue;
                    }
                };

                let store = Arc::clone(&self.store);
                let secret_id = *secret_id;
                tasks.spawn(async move {
                    let found = match store.find_user_by_id(&id).await {
                        Ok(Some(user)) => Some(user.id),
                        Ok(None) => {
                            tracing::debug!(
                                secret_id = %secret_id,
                                recipient = %id,
                                "recipient not found"
                            );
                            None
                        }
                        Err(err) => {
                            tracing::warn!(
                                secret_id = %secret_id,
                                recipient = %id,
                                error = %err,
                                "recipient lookup failed"
                            );
                            None
                        }
                    };
                    (index, found)
                });
            }

            match tasks.join_next().await {
                Some(Ok((index, found))) => verified[index] = found,
                Some(Err(err)) => {
                    tracing::warn!(secret_id = %secret_id, error = %err, "recipient check aborted");
                }
                None => break,
            }
        }

        verified
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

    fn new_secret(owner: ObjectId, org: ObjectId) -> NewSecret {
        NewSecret {
            encrypted_data: "owner-ciphertext".into(),
            owner_id: owner.to_hex(),
            role: String::new(),
            name: "db-password".into(),
            description: "primary database".into(),
            tags: ["prod".to_string()].into_iter().collect(),
            creator_email: "alice@acme.test".into(),
            kind: "password".into(),
            organization_id: org.to_hex(),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_secret_defaults() {
        let vault = vault();
        let secret = vault
            .create_secret(new_secret(ObjectId::generate(), ObjectId::generate()))
            .await
            .unwrap();
        assert!(secret.is_original());
        assert_eq!(secret.user.role, OWNER_ROLE);
    }

    #[tokio::test]
    async fn test_create_secret_validation() {
        let vault = vault();
        let owner = ObjectId::generate();
        let org = ObjectId::generate();

        let mut bad = new_secret(owner, org);
        bad.encrypted_data.clear();
        assert_eq!(
            vault.create_secret(bad).await.unwrap_err(),
            VaultError::InvalidPayload(PayloadField::Ciphertext)
        );

        let mut bad = new_secret(owner, org);
        bad.creator_email.clear();
        assert!(matches!(
            vault.create_secret(bad).await.unwrap_err(),
            VaultError::InvalidEmail(_)
        ));

        let mut bad = new_secret(owner, org);
        bad.organization_id = "abc".into();
        assert!(matches!(
            vault.create_secret(bad).await.unwrap_err(),
            VaultError::InvalidId(_)
        ));
    }

    #[tokio::test]
    async fn test_share_rejects_missing_ciphertext_before_lookup() {
        let vault = vault();
        let err = vault
            .share_secret(
                &ObjectId::generate().to_hex(),
                vec![ShareRecipient {
                    user_id: ObjectId::generate().to_hex(),
                    role: "shared".into(),
                    encrypted_data: "   ".into(),
                }],
            )
            .await
            .unwrap_err();
        assert_eq!(err, VaultError::InvalidPayload(PayloadField::Ciphertext));
    }

    #[tokio::test]
    async fn test_share_unknown_secret() {
        let vault = vault();
        assert!(matches!(
            vault.share_secret("bogus", Vec::new()).await.unwrap_err(),
            VaultError::InvalidId(_)
        ));
        assert_eq!(
            vault
                .share_secret(&ObjectId::generate().to_hex(), Vec::new())
                .await
                .unwrap_err(),
            VaultError::SecretNotFound
        );
    }

    #[tokio::test]
    async fn test_share_with_nobody_verified_inserts_nothing() {
        let vault = vault();
        let org = ObjectId::generate();
        let original = vault
            .create_secret(new_secret(ObjectId::generate(), org))
            .await
            .unwrap();

        let outcome = vault
            .share_secret(
                &original.id.to_hex(),
                vec![
                    ShareRecipient {
                        user_id: "not-an-id".into(),
                        role: "shared".into(),
                        encrypted_data: "x".into(),
                    },
                    ShareRecipient {
                        user_id: ObjectId::generate().to_hex(),
                        role: "shared".into(),
                        encrypted_data: "y".into(),
                    },
                ],
            )
            .await
            .unwrap();

        assert_eq!(outcome.results.len(), 2);
        assert!(outcome.results.values().all(|ok| !ok));
        assert!(outcome.shared.is_empty());

        let shares = vault
            .list_secret_shares(&org.to_hex(), &original.id.to_hex(), Pagination::default())
            .await
            .unwrap();
        assert!(shares.is_empty());
    }
}
