//! Users and their organization memberships.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::email::Email;
use crate::envelope::{AsymmetricKey, PasswordHash, WrappedKey};
use crate::types::ObjectId;

/// A user's link to an organization.
///
/// `wrapped_org_key` is the organization's master key re-encrypted so that
/// only this user can unwrap it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationMembership {
    pub organization_id: ObjectId,
    pub is_admin: bool,
    pub wrapped_org_key: WrappedKey,
}

impl OrganizationMembership {
    pub fn admin(organization_id: ObjectId, wrapped_org_key: WrappedKey) -> Self {
        Self {
            organization_id,
            is_admin: true,
            wrapped_org_key,
        }
    }

    pub fn member(organization_id: ObjectId, wrapped_org_key: WrappedKey) -> Self {
        Self {
            organization_id,
            is_admin: false,
            wrapped_org_key,
        }
    }
}

/// A user record.
///
/// Users are never hard-deleted. Memberships are appended by invite
/// acceptance and organization creation, and pulled by organization
/// deletion; they may briefly reference organizations that no longer exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: ObjectId,
    pub name: String,
    pub email: Email,
    pub password_hash: PasswordHash,
    pub symmetric_key: WrappedKey,
    pub asymmetric_key: AsymmetricKey,
    pub is_blacklisted: bool,
    pub memberships: Vec<OrganizationMembership>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The membership for an organization, if any.
    pub fn membership(&self, organization_id: &ObjectId) -> Option<&OrganizationMembership> {
        self.memberships
            .iter()
            .find(|m| &m.organization_id == organization_id)
    }

    pub fn is_member_of(&self, organization_id: &ObjectId) -> bool {
        self.membership(organization_id).is_some()
    }

    /// Organization ids in membership order.
    pub fn organization_ids(&self) -> Vec<ObjectId> {
        self.memberships.iter().map(|m| m.organization_id).collect()
    }
}
