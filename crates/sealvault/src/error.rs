//! Error types for the Vault.

use std::fmt;

use sealvault_core::ValidationError;
use sealvault_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The request field that failed a presence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadField {
    Sender,
    Recipient,
    OrganizationId,
    Expiry,
    Ciphertext,
    Owner,
}

impl fmt::Display for PayloadField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PayloadField::Sender => "sender email",
            PayloadField::Recipient => "recipient email",
            PayloadField::OrganizationId => "organization id",
            PayloadField::Expiry => "expiry",
            PayloadField::Ciphertext => "encrypted data",
            PayloadField::Owner => "owner id",
        })
    }
}

/// Errors that can occur during Vault operations.
///
/// Store failures never appear here verbatim: they are logged where they
/// happen and reported as [`VaultError::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// A required field is missing or empty.
    #[error("invalid payload: missing {0}")]
    InvalidPayload(PayloadField),

    /// An identifier is not a 24-char hex token.
    #[error("invalid id: {0:?}")]
    InvalidId(String),

    /// An email is malformed or already registered.
    #[error("invalid email: {0:?}")]
    InvalidEmail(String),

    /// Key material is missing a required field.
    #[error("invalid key material: missing {0}")]
    InvalidKeyMaterial(String),

    #[error("invalid password hash")]
    InvalidPasswordHash,

    #[error("user not found")]
    UserNotFound,

    #[error("organization not found")]
    OrganizationNotFound,

    /// No invite with that id, or it has expired.
    #[error("invite not found")]
    InviteNotFound,

    #[error("secret not found")]
    SecretNotFound,

    /// The bulk insert of shared copies failed; none were written.
    #[error("secret share failed")]
    ShareFailed,

    /// An unclassified storage failure.
    #[error("internal error")]
    Unknown,
}

impl VaultError {
    /// Stable machine-readable code for the transport layer.
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::InvalidPayload(PayloadField::Expiry) => "invite/invalid-expiry",
            VaultError::InvalidPayload(PayloadField::Ciphertext) => "secret/invalid-payload",
            VaultError::InvalidPayload(_) => "data/invalid-payload",
            VaultError::InvalidId(_) => "data/invalid-id",
            VaultError::InvalidEmail(_) => "data/invalid-email",
            VaultError::InvalidKeyMaterial(_) => "security/invalid-key-material",
            VaultError::InvalidPasswordHash => "user/invalid-password",
            VaultError::UserNotFound => "user/not-found",
            VaultError::OrganizationNotFound => "organization/not-found",
            VaultError::InviteNotFound => "invite/not-found",
            VaultError::SecretNotFound => "secret/not-found",
            VaultError::ShareFailed => "secret/share-failed",
            VaultError::Unknown => "server/internal-error",
        }
    }

    /// Human-readable message. Never includes storage details.
    pub fn message(&self) -> String {
        match self {
            VaultError::InvalidPayload(field) => format!("The {} is required.", field),
            VaultError::InvalidId(_) => "The identifier is not valid.".into(),
            VaultError::InvalidEmail(_) => {
                "The email address is invalid or already registered.".into()
            }
            VaultError::InvalidKeyMaterial(field) => {
                format!("The key material is incomplete: {} is required.", field)
            }
            VaultError::InvalidPasswordHash => "The password hash is invalid.".into(),
            VaultError::UserNotFound => "The user was not found.".into(),
            VaultError::OrganizationNotFound => "The organization was not found.".into(),
            VaultError::InviteNotFound => "The invite was not found or has expired.".into(),
            VaultError::SecretNotFound => "The secret was not found.".into(),
            VaultError::ShareFailed => "The secret could not be shared.".into(),
            VaultError::Unknown => "Internal server error.".into(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.message(),
        }
    }
}

impl From<ValidationError> for VaultError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidId(raw) => VaultError::InvalidId(raw),
            ValidationError::InvalidEmail(raw) => VaultError::InvalidEmail(raw),
            ValidationError::InvalidKeyMaterial { field } => {
                VaultError::InvalidKeyMaterial(field.to_string())
            }
            ValidationError::InvalidPasswordHash => VaultError::InvalidPasswordHash,
        }
    }
}

/// Serializable error surface: `{"code": ..., "message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl From<&VaultError> for ErrorBody {
    fn from(err: &VaultError) -> Self {
        err.body()
    }
}

/// Log a store failure with context and collapse it to [`VaultError::Unknown`].
pub(crate) fn store_failure(operation: &'static str, err: StoreError) -> VaultError {
    tracing::error!(operation, error = %err, "store operation failed");
    VaultError::Unknown
}

/// Result type for Vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;
    use sealvault_core::KeyField;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(VaultError::InviteNotFound.code(), "invite/not-found");
        assert_eq!(VaultError::Unknown.code(), "server/internal-error");
        assert_eq!(
            VaultError::InvalidPayload(PayloadField::Expiry).code(),
            "invite/invalid-expiry"
        );
        assert_eq!(
            VaultError::InvalidPayload(PayloadField::Sender).code(),
            "data/invalid-payload"
        );
    }

    #[test]
    fn test_validation_errors_map() {
        let err: VaultError = ValidationError::InvalidKeyMaterial {
            field: KeyField::Algorithm,
        }
        .into();
        assert_eq!(err, VaultError::InvalidKeyMaterial("algorithm".into()));

        let err: VaultError = ValidationError::InvalidId("xyz".into()).into();
        assert_eq!(err.code(), "data/invalid-id");
    }

    #[test]
    fn test_unknown_hides_store_details() {
        let err = store_failure(
            "test",
            StoreError::Unavailable("disk on fire at /var/lib/vault.db".into()),
        );
        let body = err.body();
        assert_eq!(body.code, "server/internal-error");
        assert!(!body.message.contains("vault.db"));
    }

    #[test]
    fn test_error_body_json() {
        let body = ErrorBody::from(&VaultError::SecretNotFound);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], "secret/not-found");
        assert_eq!(json["message"], "The secret was not found.");
    }
}
