//! Kernel error types.

use thiserror::Error;

use keystone_approval::ApprovalError;
use keystone_audit::AuditError;
use keystone_config::ConfigError;
use keystone_core::PlanId;
use keystone_crypto::CryptoError;
use keystone_storage::StorageError;

use crate::engine::EngineError;

/// Errors raised by the kernel.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Configuration could not be resolved.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Key material error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Plan or flow error (including tamper detection).
    #[error("approval error: {0}")]
    Approval(#[from] ApprovalError),

    /// Vault error.
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    /// Manifest error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// No signing key is configured and ephemeral keys are not allowed.
    #[error(
        "no signing key: set {key_env}, configure signing.key_file, or enable signing.allow_ephemeral"
    )]
    NoSigningKey {
        /// Environment variable that was checked.
        key_env: String,
    },

    /// The plan is not in the plan manifest.
    #[error("plan not found: {0}")]
    PlanNotFound(PlanId),

    /// The execution engine reported a failure.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;
