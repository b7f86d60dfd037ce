//! Secrets and their share lineage.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::email::Email;
use crate::types::ObjectId;

/// The owner of one secret record and the role under which they hold it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretUser {
    pub id: ObjectId,
    /// Free-form role such as "owner" or "shared".
    pub role: String,
}

/// An encrypted secret.
///
/// Originals have no `reference_key`. A shared copy points at the original
/// it was derived from; lineage is one level deep. Each copy carries
/// ciphertext wrapped for its own owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub id: ObjectId,
    pub encrypted_data: String,
    pub user: SecretUser,
    pub name: String,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub creator_email: Email,
    #[serde(rename = "type")]
    pub kind: String,
    pub organization_id: ObjectId,
    pub expires_at: Option<DateTime<Utc>>,
    pub reference_key: Option<ObjectId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Secret {
    pub fn is_original(&self) -> bool {
        self.reference_key.is_none()
    }

    /// Derive a copy of this secret for another owner.
    ///
    /// Metadata is carried over; the ciphertext is the one supplied for
    /// the recipient, never this secret's own. Copying a copy links to the
    /// same original, so lineage stays one level deep.
    pub fn share_copy(
        &self,
        recipient: SecretUser,
        encrypted_data: String,
        now: DateTime<Utc>,
    ) -> Secret {
        Secret {
            id: ObjectId::generate(),
            encrypted_data,
            user: recipient,
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            creator_email: self.creator_email.clone(),
            kind: self.kind.clone(),
            organization_id: self.organization_id,
            expires_at: self.expires_at,
            reference_key: Some(self.reference_key.unwrap_or(self.id)),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_copy_links_to_original() {
        let now = Utc::now();
        let original = Secret {
            id: ObjectId::generate(),
            encrypted_data: "owner-ciphertext".into(),
            user: SecretUser {
                id: ObjectId::from_bytes([1; 12]),
                role: "owner".into(),
            },
            name: "db-password".into(),
            description: "production database".into(),
            tags: ["prod".to_string(), "db".to_string()].into_iter().collect(),
            creator_email: Email::parse("alice@acme.test").unwrap(),
            kind: "password".into(),
            organization_id: ObjectId::from_bytes([9; 12]),
            expires_at: None,
            reference_key: None,
            created_at: now,
            updated_at: now,
        };

        let recipient = SecretUser {
            id: ObjectId::from_bytes([2; 12]),
            role: "shared".into(),
        };
        let copy = original.share_copy(recipient.clone(), "bob-ciphertext".into(), now);

        assert!(original.is_original());
        assert!(!copy.is_original());
        assert_eq!(copy.reference_key, Some(original.id));
        assert_ne!(copy.id, original.id);
        assert_eq!(copy.user, recipient);
        assert_eq!(copy.encrypted_data, "bob-ciphertext");
        assert_eq!(copy.tags, original.tags);
        assert_eq!(copy.organization_id, original.organization_id);

        let second = copy.share_copy(recipient, "carol-ciphertext".into(), now);
        assert_eq!(second.reference_key, Some(original.id));
    }
}
