//! Configuration for the Vault.

use sealvault_core::{SortOrder, DEFAULT_LIMIT, MAX_LIMIT};

/// Configuration for the Vault.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Page size used when the caller's limit is absent or out of range.
    pub default_page_limit: u32,
    /// Largest page size a caller may request.
    pub max_page_limit: u32,
    /// Order applied to every listing.
    pub sort: SortOrder,
    /// Recipient lookups in flight at once while sharing a secret.
    pub share_verification_concurrency: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            default_page_limit: DEFAULT_LIMIT,
            max_page_limit: MAX_LIMIT,
            sort: SortOrder::NewestFirst,
            share_verification_concurrency: 8,
        }
    }
}
