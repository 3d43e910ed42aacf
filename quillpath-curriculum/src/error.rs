//! Curriculum validation errors.

use quillpath_types::LevelId;
use thiserror::Error;

/// Result type for curriculum construction.
pub type CurriculumResult<T> = Result<T, CurriculumError>;

/// Errors raised while validating a curriculum definition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CurriculumError {
    #[error("duplicate level id: {0}")]
    DuplicateLevel(LevelId),

    #[error("level {level} requires unknown level {missing}")]
    UnknownPrerequisite { level: LevelId, missing: LevelId },

    #[error("prerequisite cycle involving level {0}")]
    Cycle(LevelId),

    #[error("default level {0} is not defined")]
    UnknownDefaultLevel(LevelId),

    #[error("default level {0} must not have prerequisites")]
    GatedDefaultLevel(LevelId),

    #[error("gate for {category} references unknown level {level}")]
    UnknownGateLevel { category: String, level: LevelId },

    #[error("gate threshold {0} is above 100")]
    InvalidThreshold(u8),
}
