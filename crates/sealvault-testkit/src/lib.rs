//! # SealVault Testkit
//!
//! Testing utilities for SealVault.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a vault over an in-memory store with seeding helpers
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fault injection**: [`FaultyStore`], a store wrapper that fails chosen
//!   operations so best-effort paths can be exercised
//!
//! ## Fault Injection
//!
//! ```rust
//! use sealvault_testkit::{FaultPoint, FaultyStore, TestFixture};
//! use sealvault_store::MemoryStore;
//!
//! let fixture = TestFixture::with_store(FaultyStore::new(MemoryStore::new()));
//! fixture.store().fail(FaultPoint::PushMembership);
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use sealvault_testkit::generators::key_material;
//!
//! proptest! {
//!     #[test]
//!     fn key_material_validates(key in key_material()) {
//!         prop_assert!(key.validate().is_ok());
//!     }
//! }
//! ```

pub mod faulty;
pub mod fixtures;
pub mod generators;

pub use faulty::{FaultPoint, FaultyStore};
pub use fixtures::{new_organization, new_secret, new_user, recipient, wrapped_for, TestFixture};

/// Install a test-writer tracing subscriber. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}
