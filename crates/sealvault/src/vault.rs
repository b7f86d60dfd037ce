//! The Vault: unified API over the store.
//!
//! Operations are split by concern across the `identity`, `organization`,
//! `invite` and `secret` modules, each adding an `impl` block to [`Vault`].

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};

use sealvault_core::Pagination;
use sealvault_store::{Cursor, FindOptions, Store};

use crate::config::VaultConfig;

/// The main Vault struct.
///
/// Holds the store and configuration and nothing else; all state lives in
/// the store. Multi-step operations are not transactional: if a future is
/// dropped midway, the steps already taken stay taken.
pub struct Vault<S: Store> {
    pub(crate) store: Arc<S>,
    config: VaultConfig,
}

impl<S: Store> Vault<S> {
    /// Create a new vault over a store.
    pub fn new(store: S, config: VaultConfig) -> Self {
        Self::from_shared(Arc::new(store), config)
    }

    /// Create a vault over a store that is shared with other owners.
    pub fn from_shared(store: Arc<S>, config: VaultConfig) -> Self {
        Self { store, config }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Resolve raw page/limit input against the configured bounds.
    pub fn pagination(&self, page: Option<i64>, limit: Option<i64>) -> Pagination {
        Pagination::with_bounds(
            page,
            limit,
            self.config.default_page_limit,
            self.config.max_page_limit,
        )
    }

    pub(crate) fn find_options(&self, pagination: Pagination) -> FindOptions {
        FindOptions::new(pagination, self.config.sort)
    }
}

/// Current time at the precision the store keeps.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Keep the decodable items of a listing, logging the rest.
pub(crate) fn collect_cursor<T>(operation: &'static str, cursor: Cursor<T>) -> Vec<T> {
    cursor
        .into_iter()
        .filter_map(|item| match item {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(operation, error = %err, "skipping undecodable record");
                None
            }
        })
        .collect()
}
