//! # SealVault Core
//!
//! Pure domain types for the SealVault engine: identifiers, envelope key
//! material, user/organization/invite/secret records, and pagination.
//!
//! This crate contains no I/O, no storage, no networking. Every key it
//! carries is already encrypted by a client; nothing here encrypts or
//! decrypts.
//!
//! ## Key Types
//!
//! - [`ObjectId`] - 12-byte store key, 24 hex chars on the wire
//! - [`Email`] - Case-insensitive business key for users
//! - [`KeyMaterial`] - Symmetric XOR asymmetric organization key
//! - [`WrappedKey`] - A key encrypted under another key
//! - [`User`], [`Organization`], [`Invite`], [`Secret`] - Stored records
//! - [`Pagination`] - Page/limit/skip with clamping rules

pub mod email;
pub mod envelope;
pub mod error;
pub mod invite;
pub mod organization;
pub mod pagination;
pub mod secret;
pub mod types;
pub mod user;

pub use email::Email;
pub use envelope::{AsymmetricKey, KeyMaterial, PasswordHash, WrappedKey};
pub use error::{KeyField, ValidationError};
pub use invite::Invite;
pub use organization::Organization;
pub use pagination::{Page, Pagination, SortOrder, DEFAULT_LIMIT, MAX_LIMIT};
pub use secret::{Secret, SecretUser};
pub use types::ObjectId;
pub use user::{OrganizationMembership, User};
