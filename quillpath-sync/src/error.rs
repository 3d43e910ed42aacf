//! Sync error types.

use thiserror::Error;

/// Result type for remote store operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors reported by remote store collaborators.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote request failed: {0}")]
    Remote(String),

    #[error("remote store rate limited the request")]
    RateLimited,

    #[error("remote store rejected the document: {0}")]
    Rejected(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

impl SyncError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Remote(_) | SyncError::RateLimited)
    }
}
