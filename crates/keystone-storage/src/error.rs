//! Storage error types.

use std::path::PathBuf;

/// Errors from manifest storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The manifest could not be read or decoded.
    #[error("load failed for {path}: {reason}")]
    LoadFailed {
        /// Manifest path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The manifest could not be written. The previous file is untouched.
    #[error("write failed for {path}: {reason}")]
    WriteFailed {
        /// Manifest path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The items could not be encoded.
    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    /// No manifest exists at the path.
    #[error("not found: {0}")]
    NotFound(PathBuf),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
