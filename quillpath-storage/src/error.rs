//! Storage error types.

use thiserror::Error;

/// Result type for fallible storage internals.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failures inside storage backends.
///
/// These never cross the [`Storage`](crate::Storage) trait boundary; they are
/// returned by constructors and logged by the backends themselves.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("blob version {found} does not match expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },
}
