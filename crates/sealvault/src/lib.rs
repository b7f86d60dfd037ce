//! # SealVault
//!
//! The key-distribution and secret-sharing engine of a multi-tenant
//! secrets vault.
//!
//! ## Overview
//!
//! Organizations hold secrets; users belong to organizations through
//! invites. Every key and secret the engine sees is already encrypted by a
//! client. The engine never decrypts anything: it stores and redistributes
//! ciphertext and decides who receives which wrapped key.
//!
//! - **Organizations**: created with a master key and linked to their admin
//!   through a membership carrying that key wrapped for the admin
//! - **Invites**: time-bounded grants that, on acceptance, give the
//!   recipient a membership with the key wrapped for them
//! - **Sharing**: one secret fanned out to several users as independent
//!   copies, each holding ciphertext wrapped for its owner and pointing back
//!   at the original
//!
//! ## Consistency
//!
//! Single-record writes are atomic. Multi-record flows (create an
//! organization then link its admin; delete it then detach its members)
//! treat the first step as authoritative and the second as best-effort:
//! a failure there is logged, reported where useful, and safe to retry.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sealvault::{NewOrganization, Vault, VaultConfig};
//! use sealvault::core::{KeyMaterial, WrappedKey};
//! use sealvault::store::SqliteStore;
//!
//! async fn example() {
//!     let store = SqliteStore::open("vault.db").unwrap();
//!     let vault = Vault::new(store, VaultConfig::default());
//!
//!     let created = vault
//!         .create_organization(
//!             NewOrganization {
//!                 name: "Acme".into(),
//!                 billing_email: None,
//!                 admin_email: "admin@acme.test".into(),
//!                 key_material: KeyMaterial::Symmetric(WrappedKey::new("...", "AES-GCM")),
//!             },
//!             WrappedKey::new("org key wrapped for admin", "RSA-OAEP"),
//!         )
//!         .await
//!         .unwrap();
//!
//!     if !created.admin_membership.is_linked() {
//!         // retry later with vault.link_admin(..)
//!     }
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `sealvault::core` - Domain types (ObjectId, Email, KeyMaterial, records)
//! - `sealvault::store` - Storage abstraction, SQLite and in-memory stores

pub mod config;
pub mod error;
pub mod identity;
pub mod invite;
pub mod organization;
pub mod secret;
pub mod vault;

// Re-export component crates
pub use sealvault_core as core;
pub use sealvault_store as store;

// Re-export main types for convenience
pub use config::VaultConfig;
pub use error::{ErrorBody, PayloadField, Result, VaultError};
pub use identity::NewUser;
pub use invite::{InviteAcceptance, NewInvite};
pub use organization::{DetachReason, MembershipLink, NewOrganization, OrganizationCreated};
pub use secret::{NewSecret, ShareOutcome, ShareRecipient, OWNER_ROLE};
pub use vault::Vault;

// Re-export commonly used core types
pub use sealvault_core::{
    AsymmetricKey, Email, Invite, KeyMaterial, ObjectId, Organization, OrganizationMembership,
    Page, Pagination, PasswordHash, Secret, SecretUser, SortOrder, User, WrappedKey,
};
