//! Invites: time-bounded, one-time grants of organization membership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::email::Email;
use crate::envelope::WrappedKey;
use crate::types::ObjectId;
use crate::user::OrganizationMembership;

/// A pending invite.
///
/// An invite is active while `expires_at > now`. Past that instant it is
/// treated as absent by acceptance and by "active" listings, but it is not
/// deleted until someone deletes it explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    pub id: ObjectId,
    pub from_email: Email,
    pub to_email: Email,
    pub organization_id: ObjectId,
    pub expires_at: DateTime<Utc>,
    /// The organization key wrapped for the recipient.
    pub wrapped_key: WrappedKey,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invite {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// The membership the recipient receives on acceptance.
    pub fn membership(&self) -> OrganizationMembership {
        OrganizationMembership::member(self.organization_id, self.wrapped_key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn invite(expires_at: DateTime<Utc>) -> Invite {
        let now = Utc::now();
        Invite {
            id: ObjectId::generate(),
            from_email: Email::parse("admin@acme.test").unwrap(),
            to_email: Email::parse("bob@acme.test").unwrap(),
            organization_id: ObjectId::from_bytes([7; 12]),
            expires_at,
            wrapped_key: WrappedKey::new("wrapped-for-bob", "AES-GCM"),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let now = Utc::now();
        assert!(invite(now + Duration::seconds(1)).is_active(now));
        assert!(!invite(now).is_active(now));
        assert!(!invite(now - Duration::seconds(1)).is_active(now));
    }

    #[test]
    fn test_membership_is_not_admin() {
        let inv = invite(Utc::now());
        let membership = inv.membership();
        assert!(!membership.is_admin);
        assert_eq!(membership.organization_id, inv.organization_id);
        assert_eq!(membership.wrapped_org_key.ciphertext, "wrapped-for-bob");
    }
}
