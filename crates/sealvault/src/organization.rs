//! Organization registry: creation with admin key linkage, deletion with
//! membership cascade, and batch lookup.

use sealvault_core::{
    Email, KeyMaterial, ObjectId, Organization, OrganizationMembership, WrappedKey,
};
use sealvault_store::Store;

use crate::error::{store_failure, Result, VaultError};
use crate::vault::{collect_cursor, now, Vault};

/// Input for creating an organization.
#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub name: String,
    pub billing_email: Option<String>,
    pub admin_email: String,
    pub key_material: KeyMaterial,
}

/// Why a membership could not be attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachReason {
    /// No user is registered under the target email.
    UserNotFound,
    /// The store rejected or failed the write.
    StoreFailure,
}

/// Outcome of a best-effort membership append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipLink {
    /// The membership was appended.
    Attached,
    /// The user already held a membership for the organization.
    AlreadyPresent,
    /// The membership is missing and should be retried out of band.
    Detached { reason: DetachReason },
}

impl MembershipLink {
    pub fn is_linked(&self) -> bool {
        !matches!(self, MembershipLink::Detached { .. })
    }
}

/// The created organization and the state of its admin's membership.
///
/// The organization exists even when `admin_membership` is detached.
#[derive(Debug, Clone)]
pub struct OrganizationCreated {
    pub organization: Organization,
    pub admin_membership: MembershipLink,
}

impl<S: Store> Vault<S> {
    // ─────────────────────────────────────────────────────────────────────────
    // Organization Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an organization and link its admin.
    ///
    /// `admin_wrapped_key` is the organization key wrapped for the admin.
    /// Persisting the organization is authoritative; the admin link is
    /// attempted once and its outcome reported, never raised.
    pub async fn create_organization(
        &self,
        new: NewOrganization,
        admin_wrapped_key: WrappedKey,
    ) -> Result<OrganizationCreated> {
        new.key_material.validate()?;
        admin_wrapped_key.validate()?;
        let admin_email = Email::parse(&new.admin_email)?;
        let billing_email = match new.billing_email.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(Email::parse(raw)?),
        };

        let at = now();
        let organization = Organization {
            id: ObjectId::generate(),
            name: new.name.trim().to_string(),
            billing_email,
            admin_email,
            key_material: new.key_material,
            created_at: at,
            updated_at: at,
        };

        self.store
            .insert_organization(&organization)
            .await
            .map_err(|e| store_failure("create_organization", e))?;

        let admin_membership = self
            .attach_membership(
                &organization.admin_email,
                OrganizationMembership::admin(organization.id, admin_wrapped_key),
            )
            .await;

        Ok(OrganizationCreated {
            organization,
            admin_membership,
        })
    }

    /// Re-apply the admin link for an existing organization.
    ///
    /// Safe to repeat: once attached, further calls report `AlreadyPresent`.
    pub async fn link_admin(
        &self,
        organization_id: &str,
        admin_wrapped_key: WrappedKey,
    ) -> Result<MembershipLink> {
        let id = ObjectId::parse(organization_id)?;
        admin_wrapped_key.validate()?;

        let organization = self
            .store
            .find_organization(&id)
            .await
            .map_err(|e| store_failure("link_admin", e))?
            .ok_or(VaultError::OrganizationNotFound)?;

        Ok(self
            .attach_membership(
                &organization.admin_email,
                OrganizationMembership::admin(organization.id, admin_wrapped_key),
            )
            .await)
    }

    /// Delete an organization, then detach it from its members.
    ///
    /// The deleted count (0 or 1) is authoritative. The membership cascade
    /// runs regardless of the count and its failure is only logged.
    pub async fn delete_organization(&self, id: &str) -> Result<u64> {
        let id = ObjectId::parse(id)?;

        let deleted = self
            .store
            .delete_organization(&id)
            .await
            .map_err(|e| store_failure("delete_organization", e))?;

        match self.store.pull_memberships(&id).await {
            Ok(result) => {
                tracing::debug!(
                    org_id = %id,
                    modified = result.modified_count,
                    "removed organization memberships"
                );
            }
            Err(err) => {
                tracing::warn!(
                    org_id = %id,
                    error = %err,
                    "membership cascade failed; users keep dangling memberships"
                );
            }
        }

        Ok(deleted)
    }

    /// Look up organizations by wire id.
    ///
    /// Malformed ids are skipped individually; unknown ids are absent.
    pub async fn list_organizations<I>(&self, ids: I) -> Result<Vec<Organization>>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let ids: Vec<ObjectId> = ids
            .into_iter()
            .filter_map(|raw| match ObjectId::parse(raw.as_ref()) {
                Ok(id) => Some(id),
                Err(err) => {
                    tracing::debug!(error = %err, "skipping malformed organization id");
                    None
                }
            })
            .collect();

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let cursor = self
            .store
            .find_organizations(&ids)
            .await
            .map_err(|e| store_failure("list_organizations", e))?;
        Ok(collect_cursor("list_organizations", cursor))
    }

    /// Best-effort membership append shared by organization creation and
    /// invite acceptance. Never fails; the outcome is logged and returned.
    pub(crate) async fn attach_membership(
        &self,
        email: &Email,
        membership: OrganizationMembership,
    ) -> MembershipLink {
        match self.store.push_membership(email, &membership).await {
            Ok(result) if result.modified_count > 0 => MembershipLink::Attached,
            Ok(result) if result.matched_count > 0 => MembershipLink::AlreadyPresent,
            Ok(_) => {
                tracing::warn!(
                    org_id = %membership.organization_id,
                    recipient = %email,
                    "no user to attach membership to"
                );
                MembershipLink::Detached {
                    reason: DetachReason::UserNotFound,
                }
            }
            Err(err) => {
                tracing::warn!(
                    org_id = %membership.organization_id,
                    recipient = %email,
                    error = %err,
                    "failed to attach membership"
                );
                MembershipLink::Detached {
                    reason: DetachReason::StoreFailure,
                }
            }
        }
    }
}
