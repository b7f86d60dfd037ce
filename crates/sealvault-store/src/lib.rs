//! # SealVault Store
//!
//! Storage abstraction for SealVault. Provides a trait-based interface for
//! user, organization, invite and secret persistence with SQLite and
//! in-memory implementations.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`FindOptions`] - Skip, limit and order for listings
//! - [`Cursor`] - A listing whose items decode independently
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sealvault_store::{SqliteStore, Store};
//! use sealvault_core::Email;
//!
//! async fn example() {
//!     let store = SqliteStore::open("vault.db").unwrap();
//!
//!     let email = Email::parse("alice@acme.test").unwrap();
//!     let alice = store.find_user_by_email(&email).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Single-document atomicity**: each call is atomic on its own; the
//!   engine's multi-step flows are not transactional
//! - **Atomic bulk insert**: `insert_secrets` writes all records or none
//! - **Idempotent membership append**: re-pushing a membership for the same
//!   organization matches without modifying

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{
    Cursor, FindOptions, InviteFilter, InviteScope, SecretFilter, Store, UpdateResult,
};
