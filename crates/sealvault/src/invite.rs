//! Invite workflow.
//!
//! An invite is `Pending` until it is accepted (record removed), deleted
//! (record removed) or expires. Expiry is implicit: an expired invite stays
//! in the store but is excluded from acceptance and active listings.

use chrono::{DateTime, Utc};

use sealvault_core::{Email, Invite, ObjectId, Pagination, WrappedKey};
use sealvault_store::{InviteFilter, InviteScope, Store};

use crate::error::{store_failure, PayloadField, Result, VaultError};
use crate::organization::MembershipLink;
use crate::vault::{collect_cursor, now, Vault};

/// Input for sending an invite.
#[derive(Debug, Clone)]
pub struct NewInvite {
    pub from_email: String,
    pub to_email: String,
    pub organization_id: String,
    pub expires_at: Option<DateTime<Utc>>,
    /// The organization key wrapped for the recipient.
    pub wrapped_key: WrappedKey,
}

/// A successful acceptance.
///
/// Acceptance succeeds on invite validity alone. `membership` reports
/// whether the recipient's membership actually attached.
#[derive(Debug, Clone)]
pub struct InviteAcceptance {
    pub invite: Invite,
    pub membership: MembershipLink,
}

fn require(value: &str, field: PayloadField) -> Result<()> {
    if value.trim().is_empty() {
        return Err(VaultError::InvalidPayload(field));
    }
    Ok(())
}

impl<S: Store> Vault<S> {
    // ─────────────────────────────────────────────────────────────────────────
    // Invite Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Issue an invite.
    ///
    /// Presence checks run first, in order: sender, organization id,
    /// recipient, expiry. An expiry at or before the Unix epoch counts as
    /// absent.
    pub async fn send_invite(&self, new: NewInvite) -> Result<Invite> {
        require(&new.from_email, PayloadField::Sender)?;
        require(&new.organization_id, PayloadField::OrganizationId)?;
        require(&new.to_email, PayloadField::Recipient)?;
        let expires_at = new
            .expires_at
            .filter(|at| at.timestamp_millis() > 0)
            .ok_or(VaultError::InvalidPayload(PayloadField::Expiry))?;

        let from_email = Email::parse(&new.from_email)?;
        let to_email = Email::parse(&new.to_email)?;
        let organization_id = ObjectId::parse(&new.organization_id)?;
        new.wrapped_key.validate()?;

        let at = now();
        let invite = Invite {
            id: ObjectId::generate(),
            from_email,
            to_email,
            organization_id,
            expires_at,
            wrapped_key: new.wrapped_key,
            created_at: at,
            updated_at: at,
        };

        self.store
            .insert_invite(&invite)
            .await
            .map_err(|e| store_failure("send_invite", e))?;
        Ok(invite)
    }

    /// Accept an active invite.
    ///
    /// Expired invites are `InviteNotFound`. Once the invite is found the
    /// call succeeds: the membership append and the invite deletion are
    /// best-effort and their failures are only logged.
    pub async fn accept_invite(&self, id: &str) -> Result<InviteAcceptance> {
        let id = ObjectId::parse(id)?;

        let invite = self
            .store
            .find_active_invite(&id, now())
            .await
            .map_err(|e| store_failure("accept_invite", e))?
            .ok_or(VaultError::InviteNotFound)?;

        let membership = self
            .attach_membership(&invite.to_email, invite.membership())
            .await;

        if let Err(err) = self.store.delete_invite(&invite.id).await {
            tracing::warn!(
                invite_id = %invite.id,
                error = %err,
                "failed to delete accepted invite"
            );
        }

        Ok(InviteAcceptance { invite, membership })
    }

    /// Revoke an invite. Returns the deleted count (0 or 1).
    pub async fn delete_invite(&self, id: &str) -> Result<u64> {
        let id = ObjectId::parse(id)?;
        self.store
            .delete_invite(&id)
            .await
            .map_err(|e| store_failure("delete_invite", e))
    }

    pub async fn list_invites_by_organization(
        &self,
        organization_id: &str,
        pagination: Pagination,
        only_active: bool,
    ) -> Result<Vec<Invite>> {
        let org_id = ObjectId::parse(organization_id)?;
        self.list_invites(InviteScope::Organization(org_id), pagination, only_active)
            .await
    }

    pub async fn list_invites_for_user(
        &self,
        recipient_email: &str,
        pagination: Pagination,
        only_active: bool,
    ) -> Result<Vec<Invite>> {
        let email = Email::parse(recipient_email)?;
        self.list_invites(InviteScope::Recipient(email), pagination, only_active)
            .await
    }

    async fn list_invites(
        &self,
        scope: InviteScope,
        pagination: Pagination,
        only_active: bool,
    ) -> Result<Vec<Invite>> {
        let filter = InviteFilter {
            scope,
            active_at: only_active.then(now),
        };
        let cursor = self
            .store
            .find_invites(&filter, &self.find_options(pagination))
            .await
            .map_err(|e| store_failure("list_invites", e))?;
        Ok(collect_cursor("list_invites", cursor))
    }
}
