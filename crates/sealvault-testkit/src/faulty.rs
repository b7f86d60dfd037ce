//! A store wrapper that fails chosen operations on demand.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use sealvault_core::{Email, Invite, ObjectId, Organization, OrganizationMembership, Secret, User};
use sealvault_store::{
    Cursor, FindOptions, InviteFilter, Result, SecretFilter, Store, StoreError, UpdateResult,
};

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    PushMembership,
    PullMemberships,
    InsertSecrets,
    FindUserById,
    DeleteInvite,
}

impl FaultPoint {
    const ALL: [FaultPoint; 5] = [
        FaultPoint::PushMembership,
        FaultPoint::PullMemberships,
        FaultPoint::InsertSecrets,
        FaultPoint::FindUserById,
        FaultPoint::DeleteInvite,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            FaultPoint::PushMembership => "push_membership",
            FaultPoint::PullMemberships => "pull_memberships",
            FaultPoint::InsertSecrets => "insert_secrets",
            FaultPoint::FindUserById => "find_user_by_id",
            FaultPoint::DeleteInvite => "delete_invite",
        }
    }
}

/// Wraps a store and returns `StoreError::Unavailable` from any armed
/// operation. Unarmed operations pass through.
pub struct FaultyStore<S> {
    inner: S,
    armed: [AtomicBool; FaultPoint::ALL.len()],
    injected: AtomicUsize,
    /// `find_user_by_id` fails only for these ids when non-empty.
    failing_users: Mutex<Vec<ObjectId>>,
}

impl<S: Store> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            armed: Default::default(),
            injected: AtomicUsize::new(0),
            failing_users: Mutex::new(Vec::new()),
        }
    }

    /// Make an operation fail from now on.
    pub fn fail(&self, point: FaultPoint) -> &Self {
        self.armed[point.index()].store(true, Ordering::SeqCst);
        self
    }

    /// Let an operation succeed again.
    pub fn heal(&self, point: FaultPoint) -> &Self {
        self.armed[point.index()].store(false, Ordering::SeqCst);
        self
    }

    /// Restrict `find_user_by_id` failures to one user.
    pub fn fail_lookup_of(&self, user_id: ObjectId) -> &Self {
        if let Ok(mut ids) = self.failing_users.lock() {
            ids.push(user_id);
        }
        self.fail(FaultPoint::FindUserById)
    }

    /// Number of failures injected so far.
    pub fn injected(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(&self, point: FaultPoint) -> Result<()> {
        if self.armed[point.index()].load(Ordering::SeqCst) {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Unavailable(format!(
                "injected fault: {}",
                point.name()
            )));
        }
        Ok(())
    }

    fn check_user_lookup(&self, id: &ObjectId) -> Result<()> {
        let targeted = match self.failing_users.lock() {
            Ok(ids) => ids.is_empty() || ids.contains(id),
            Err(_) => true,
        };
        if targeted {
            self.check(FaultPoint::FindUserById)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<S: Store> Store for FaultyStore<S> {
    async fn insert_user(&self, user: &User) -> Result<()> {
        self.inner.insert_user(user).await
    }

    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>> {
        self.inner.find_user_by_email(email).await
    }

    async fn find_user_by_id(&self, id: &ObjectId) -> Result<Option<User>> {
        self.check_user_lookup(id)?;
        self.inner.find_user_by_id(id).await
    }

    async fn push_membership(
        &self,
        email: &Email,
        membership: &OrganizationMembership,
    ) -> Result<UpdateResult> {
        self.check(FaultPoint::PushMembership)?;
        self.inner.push_membership(email, membership).await
    }

    async fn pull_memberships(&self, organization_id: &ObjectId) -> Result<UpdateResult> {
        self.check(FaultPoint::PullMemberships)?;
        self.inner.pull_memberships(organization_id).await
    }

    async fn find_users_by_organization(
        &self,
        organization_id: &ObjectId,
        options: &FindOptions,
    ) -> Result<Cursor<User>> {
        self.inner
            .find_users_by_organization(organization_id, options)
            .await
    }

    async fn insert_organization(&self, organization: &Organization) -> Result<()> {
        self.inner.insert_organization(organization).await
    }

    async fn find_organization(&self, id: &ObjectId) -> Result<Option<Organization>> {
        self.inner.find_organization(id).await
    }

    async fn find_organizations(&self, ids: &[ObjectId]) -> Result<Cursor<Organization>> {
        self.inner.find_organizations(ids).await
    }

    async fn delete_organization(&self, id: &ObjectId) -> Result<u64> {
        self.inner.delete_organization(id).await
    }

    async fn insert_invite(&self, invite: &Invite) -> Result<()> {
        self.inner.insert_invite(invite).await
    }

    async fn find_active_invite(
        &self,
        id: &ObjectId,
        now: DateTime<Utc>,
    ) -> Result<Option<Invite>> {
        self.inner.find_active_invite(id, now).await
    }

    async fn find_invites(
        &self,
        filter: &InviteFilter,
        options: &FindOptions,
    ) -> Result<Cursor<Invite>> {
        self.inner.find_invites(filter, options).await
    }

    async fn delete_invite(&self, id: &ObjectId) -> Result<u64> {
        self.check(FaultPoint::DeleteInvite)?;
        self.inner.delete_invite(id).await
    }

    async fn insert_secret(&self, secret: &Secret) -> Result<()> {
        self.inner.insert_secret(secret).await
    }

    async fn insert_secrets(&self, secrets: &[Secret]) -> Result<()> {
        self.check(FaultPoint::InsertSecrets)?;
        self.inner.insert_secrets(secrets).await
    }

    async fn find_secret(&self, id: &ObjectId) -> Result<Option<Secret>> {
        self.inner.find_secret(id).await
    }

    async fn find_secrets(
        &self,
        filter: &SecretFilter,
        options: &FindOptions,
    ) -> Result<Cursor<Secret>> {
        self.inner.find_secrets(filter, options).await
    }
}
