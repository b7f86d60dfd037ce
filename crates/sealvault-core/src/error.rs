//! Error types for SealVault Core.

use std::fmt;

use thiserror::Error;

/// The field of a key-material record that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyField {
    Ciphertext,
    Algorithm,
    PublicKey,
    WrappedPrivateKey,
}

impl fmt::Display for KeyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyField::Ciphertext => "ciphertext",
            KeyField::Algorithm => "algorithm",
            KeyField::PublicKey => "public key",
            KeyField::WrappedPrivateKey => "wrapped private key",
        };
        f.write_str(name)
    }
}

/// Validation errors for identifiers, emails and key material.
///
/// These are detected before any store access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid id: {0:?}")]
    InvalidId(String),

    #[error("invalid email: {0:?}")]
    InvalidEmail(String),

    #[error("invalid key material: missing {field}")]
    InvalidKeyMaterial { field: KeyField },

    #[error("invalid password hash: hash and algorithm are required")]
    InvalidPasswordHash,
}
