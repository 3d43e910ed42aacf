//! Exercise generation error types.

use quillpath_types::LevelId;
use std::time::Duration;
use thiserror::Error;

/// Result type for scheduler operations surfaced to the UI.
pub type ExerciseResult<T> = Result<T, ExerciseError>;

/// Errors reported by an [`ExerciseGenerator`](crate::ExerciseGenerator).
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generator unavailable: {0}")]
    Unavailable(String),

    #[error("generator rate limited the request")]
    RateLimited,

    #[error("generator returned an unusable exercise: {0}")]
    InvalidResponse(String),

    #[error("generator rejected the request: {0}")]
    Rejected(String),
}

impl GeneratorError {
    /// Whether the same request may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GeneratorError::Unavailable(_)
                | GeneratorError::RateLimited
                | GeneratorError::InvalidResponse(_)
        )
    }
}

/// Errors the learner can see. Background generation never produces these;
/// its failures are logged instead.
#[derive(Debug, Error)]
pub enum ExerciseError {
    #[error("could not generate an exercise for {level}: {reason}")]
    GenerationFailed { level: LevelId, reason: String },

    #[error("timed out after {waited:?} waiting for exercise {index} of {level}")]
    WaitTimedOut {
        level: LevelId,
        index: usize,
        waited: Duration,
    },

    #[error("unknown level: {0}")]
    UnknownLevel(String),
}

impl ExerciseError {
    /// Whether the UI should offer a manual retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ExerciseError::UnknownLevel(_))
    }
}
