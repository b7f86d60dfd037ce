//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};

use sealvault_core::{Email, Invite, ObjectId, Organization, OrganizationMembership, Secret, User};

use crate::error::{Result, StoreError};
use crate::traits::{Cursor, FindOptions, InviteFilter, SecretFilter, Store, UpdateResult};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    users: HashMap<ObjectId, User>,

    /// Email index: normalized email -> user id.
    emails: HashMap<Email, ObjectId>,

    organizations: HashMap<ObjectId, Organization>,

    invites: HashMap<ObjectId, Invite>,

    secrets: HashMap<ObjectId, Secret>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Current time at the millisecond precision the SQLite backend keeps.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Apply ordering, skip and limit to a filtered set.
fn page_of<T: Clone>(
    mut items: Vec<&T>,
    options: &FindOptions,
    key: impl Fn(&T) -> (&DateTime<Utc>, &ObjectId),
) -> Cursor<T> {
    items.sort_by(|a, b| options.compare(key(*a), key(*b)));
    items
        .into_iter()
        .skip(options.skip as usize)
        .take(options.limit as usize)
        .map(|item| Ok(item.clone()))
        .collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut inner = self.write()?;

        if inner.emails.contains_key(&user.email) {
            return Err(StoreError::Duplicate(format!("email {}", user.email)));
        }
        if inner.users.contains_key(&user.id) {
            return Err(StoreError::Duplicate(format!("user {}", user.id)));
        }

        // One membership per organization; the first listed wins.
        let mut user = user.clone();
        let mut seen = HashSet::new();
        user.memberships.retain(|m| seen.insert(m.organization_id));

        inner.emails.insert(user.email.clone(), user.id);
        inner.users.insert(user.id, user);
        Ok(())
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>> {
        let inner = self.read()?;
        Ok(inner
            .emails
            .get(email)
            .and_then(|id| inner.users.get(id))
            .cloned())
    }

    async fn find_user_by_id(&self, id: &ObjectId) -> Result<Option<User>> {
        let inner = self.read()?;
        Ok(inner.users.get(id).cloned())
    }

    async fn push_membership(
        &self,
        email: &Email,
        membership: &OrganizationMembership,
    ) -> Result<UpdateResult> {
        let mut inner = self.write()?;

        let Some(id) = inner.emails.get(email).copied() else {
            return Ok(UpdateResult::default());
        };
        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(UpdateResult::default());
        };

        if user.is_member_of(&membership.organization_id) {
            return Ok(UpdateResult {
                matched_count: 1,
                modified_count: 0,
            });
        }

        user.memberships.push(membership.clone());
        user.updated_at = now();
        Ok(UpdateResult {
            matched_count: 1,
            modified_count: 1,
        })
    }

    async fn pull_memberships(&self, organization_id: &ObjectId) -> Result<UpdateResult> {
        let mut inner = self.write()?;
        let at = now();

        let mut result = UpdateResult::default();
        for user in inner.users.values_mut() {
            if !user.is_member_of(organization_id) {
                continue;
            }
            user.memberships
                .retain(|m| &m.organization_id != organization_id);
            user.updated_at = at;
            result.matched_count += 1;
            result.modified_count += 1;
        }
        Ok(result)
    }

    async fn find_users_by_organization(
        &self,
        organization_id: &ObjectId,
        options: &FindOptions,
    ) -> Result<Cursor<User>> {
        let inner = self.read()?;
        let members = inner
            .users
            .values()
            .filter(|u| u.is_member_of(organization_id))
            .collect();
        Ok(page_of(members, options, |u| (&u.created_at, &u.id)))
    }

    async fn insert_organization(&self, organization: &Organization) -> Result<()> {
        let mut inner = self.write()?;
        if inner.organizations.contains_key(&organization.id) {
            return Err(StoreError::Duplicate(format!(
                "organization {}",
                organization.id
            )));
        }
        inner
            .organizations
            .insert(organization.id, organization.clone());
        Ok(())
    }

    async fn find_organization(&self, id: &ObjectId) -> Result<Option<Organization>> {
        let inner = self.read()?;
        Ok(inner.organizations.get(id).cloned())
    }

    async fn find_organizations(&self, ids: &[ObjectId]) -> Result<Cursor<Organization>> {
        let inner = self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| inner.organizations.get(id))
            .map(|org| Ok(org.clone()))
            .collect())
    }

    async fn delete_organization(&self, id: &ObjectId) -> Result<u64> {
        let mut inner = self.write()?;
        Ok(inner.organizations.remove(id).map_or(0, |_| 1))
    }

    async fn insert_invite(&self, invite: &Invite) -> Result<()> {
        let mut inner = self.write()?;
        if inner.invites.contains_key(&invite.id) {
            return Err(StoreError::Duplicate(format!("invite {}", invite.id)));
        }
        inner.invites.insert(invite.id, invite.clone());
        Ok(())
    }

    async fn find_active_invite(
        &self,
        id: &ObjectId,
        now: DateTime<Utc>,
    ) -> Result<Option<Invite>> {
        let inner = self.read()?;
        Ok(inner
            .invites
            .get(id)
            .filter(|invite| invite.is_active(now))
            .cloned())
    }

    async fn find_invites(
        &self,
        filter: &InviteFilter,
        options: &FindOptions,
    ) -> Result<Cursor<Invite>> {
        let inner = self.read()?;
        let matching = inner
            .invites
            .values()
            .filter(|invite| filter.matches(invite))
            .collect();
        Ok(page_of(matching, options, |i| (&i.created_at, &i.id)))
    }

    async fn delete_invite(&self, id: &ObjectId) -> Result<u64> {
        let mut inner = self.write()?;
        Ok(inner.invites.remove(id).map_or(0, |_| 1))
    }

    async fn insert_secret(&self, secret: &Secret) -> Result<()> {
        self.insert_secrets(std::slice::from_ref(secret)).await
    }

    async fn insert_secrets(&self, secrets: &[Secret]) -> Result<()> {
        let mut inner = self.write()?;

        // Validate the whole batch before touching the map.
        for (i, secret) in secrets.iter().enumerate() {
            let repeated = secrets[..i].iter().any(|s| s.id == secret.id);
            if repeated || inner.secrets.contains_key(&secret.id) {
                return Err(StoreError::Duplicate(format!("secret {}", secret.id)));
            }
        }

        for secret in secrets {
            inner.secrets.insert(secret.id, secret.clone());
        }
        Ok(())
    }

    async fn find_secret(&self, id: &ObjectId) -> Result<Option<Secret>> {
        let inner = self.read()?;
        Ok(inner.secrets.get(id).cloned())
    }

    async fn find_secrets(
        &self,
        filter: &SecretFilter,
        options: &FindOptions,
    ) -> Result<Cursor<Secret>> {
        let inner = self.read()?;
        let matching = inner
            .secrets
            .values()
            .filter(|secret| filter.matches(secret))
            .collect();
        Ok(page_of(matching, options, |s| (&s.created_at, &s.id)))
    }
}
