//! Store trait: the abstract interface for document persistence.
//!
//! This trait allows the engine to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use sealvault_core::{
    Email, Invite, ObjectId, Organization, OrganizationMembership, Pagination, Secret, SortOrder,
    User,
};

use crate::error::Result;

/// The outcome of a listing.
///
/// Each item is decoded independently, so one malformed record shows up as
/// a single `Err(StoreError::Decode)` entry rather than failing the batch.
pub type Cursor<T> = Vec<Result<T>>;

/// Result of an update touching one or more documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// Documents that matched the filter.
    pub matched_count: u64,
    /// Documents actually changed.
    pub modified_count: u64,
}

/// Skip, limit and order for a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindOptions {
    pub skip: u64,
    pub limit: u32,
    pub sort: SortOrder,
}

impl FindOptions {
    pub fn new(pagination: Pagination, sort: SortOrder) -> Self {
        Self {
            skip: pagination.skip(),
            limit: pagination.limit(),
            sort,
        }
    }

    /// Order two records by (created_at, id) in this listing's direction.
    pub fn compare(
        &self,
        a: (&DateTime<Utc>, &ObjectId),
        b: (&DateTime<Utc>, &ObjectId),
    ) -> Ordering {
        let ord = a.0.cmp(b.0).then_with(|| a.1.cmp(b.1));
        match self.sort {
            SortOrder::NewestFirst => ord.reverse(),
            SortOrder::OldestFirst => ord,
        }
    }

    /// SQL `ORDER BY` direction for this listing.
    pub fn sql_direction(&self) -> &'static str {
        match self.sort {
            SortOrder::NewestFirst => "DESC",
            SortOrder::OldestFirst => "ASC",
        }
    }
}

impl Default for FindOptions {
    fn default() -> Self {
        Self::new(Pagination::default(), SortOrder::default())
    }
}

/// Which invites a listing covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteScope {
    Organization(ObjectId),
    Recipient(Email),
}

/// Filter for invite listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteFilter {
    pub scope: InviteScope,
    /// When set, only invites with `expires_at > active_at` match.
    pub active_at: Option<DateTime<Utc>>,
}

impl InviteFilter {
    pub fn matches(&self, invite: &Invite) -> bool {
        let in_scope = match &self.scope {
            InviteScope::Organization(org) => &invite.organization_id == org,
            InviteScope::Recipient(email) => &invite.to_email == email,
        };
        in_scope && self.active_at.map_or(true, |now| invite.is_active(now))
    }
}

/// Filter for secret listings. Set fields combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretFilter {
    pub owner: Option<ObjectId>,
    pub organization_id: Option<ObjectId>,
    pub reference_key: Option<ObjectId>,
}

impl SecretFilter {
    pub fn owner(mut self, user_id: ObjectId) -> Self {
        self.owner = Some(user_id);
        self
    }

    pub fn organization(mut self, organization_id: ObjectId) -> Self {
        self.organization_id = Some(organization_id);
        self
    }

    pub fn shared_from(mut self, original_id: ObjectId) -> Self {
        self.reference_key = Some(original_id);
        self
    }

    pub fn matches(&self, secret: &Secret) -> bool {
        self.owner.map_or(true, |id| secret.user.id == id)
            && self
                .organization_id
                .map_or(true, |id| secret.organization_id == id)
            && self
                .reference_key
                .map_or(true, |id| secret.reference_key == Some(id))
    }
}

/// The Store trait: async interface for document persistence.
///
/// Single-document operations are atomic. Multi-document sequences are the
/// caller's business and are not transactional, with one exception:
/// [`Store::insert_secrets`] writes its whole batch or nothing.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new user. Fails with `Duplicate` if the email is taken.
    async fn insert_user(&self, user: &User) -> Result<()>;

    /// Find a user by (normalized) email.
    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>>;

    /// Find a user by id.
    async fn find_user_by_id(&self, id: &ObjectId) -> Result<Option<User>>;

    /// Append a membership to the user with this email.
    ///
    /// If the user already holds a membership for the same organization the
    /// call matches but does not modify, so re-applying it is harmless.
    async fn push_membership(
        &self,
        email: &Email,
        membership: &OrganizationMembership,
    ) -> Result<UpdateResult>;

    /// Remove the membership for an organization from every user holding it.
    async fn pull_memberships(&self, organization_id: &ObjectId) -> Result<UpdateResult>;

    /// List users holding a membership for an organization.
    async fn find_users_by_organization(
        &self,
        organization_id: &ObjectId,
        options: &FindOptions,
    ) -> Result<Cursor<User>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Organizations
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_organization(&self, organization: &Organization) -> Result<()>;

    async fn find_organization(&self, id: &ObjectId) -> Result<Option<Organization>>;

    /// Fetch organizations by id. Unknown ids are simply absent.
    async fn find_organizations(&self, ids: &[ObjectId]) -> Result<Cursor<Organization>>;

    /// Delete an organization. Returns the number deleted (0 or 1).
    async fn delete_organization(&self, id: &ObjectId) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Invites
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_invite(&self, invite: &Invite) -> Result<()>;

    /// Find an invite by id that is still active at `now`.
    async fn find_active_invite(
        &self,
        id: &ObjectId,
        now: DateTime<Utc>,
    ) -> Result<Option<Invite>>;

    async fn find_invites(
        &self,
        filter: &InviteFilter,
        options: &FindOptions,
    ) -> Result<Cursor<Invite>>;

    /// Delete an invite. Returns the number deleted (0 or 1).
    async fn delete_invite(&self, id: &ObjectId) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Secrets
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_secret(&self, secret: &Secret) -> Result<()>;

    /// Insert a batch of secrets atomically: all of them or none.
    async fn insert_secrets(&self, secrets: &[Secret]) -> Result<()>;

    async fn find_secret(&self, id: &ObjectId) -> Result<Option<Secret>>;

    async fn find_secrets(
        &self,
        filter: &SecretFilter,
        options: &FindOptions,
    ) -> Result<Cursor<Secret>>;
}
