//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
///
/// These never reach callers of the engine verbatim; the engine logs them
/// and surfaces a generic error instead.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The backend could not serve the request (poisoned lock, lost worker).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A record could not be encoded for storage.
    #[error("encode error: {0}")]
    Encode(String),

    /// A stored record could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A unique key is already taken.
    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_decode(&self) -> bool {
        matches!(self, StoreError::Decode(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
