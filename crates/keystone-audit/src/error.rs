//! Audit-related error types.

use thiserror::Error;

/// Errors that can occur with the audit vault.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The vault feature is switched off.
    #[error("audit vault is not enabled")]
    NotEnabled,

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// An export contained something that looks like user content.
    #[error("forbidden content at {path}: {reason}")]
    ForbiddenContent {
        /// JSON path of the offending value.
        path: String,
        /// What rule it broke.
        reason: String,
    },
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
