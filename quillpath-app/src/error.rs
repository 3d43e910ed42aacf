//! Bootstrap error types.

use quillpath_curriculum::CurriculumError;
use quillpath_storage::StorageError;
use thiserror::Error;

/// Result type for service construction.
pub type AppResult<T> = Result<T, AppError>;

/// Failures that prevent the core from starting. Nothing after bootstrap
/// returns these.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("curriculum error: {0}")]
    Curriculum(#[from] CurriculumError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
