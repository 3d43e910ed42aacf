//! Exercise records, generation requests and tasks.

use chrono::{DateTime, Utc};
use quillpath_types::{Category, LevelId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Shape of a practice exercise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    /// Rewrite a flawed passage.
    Rewrite,
    /// Put shuffled sentences back in order.
    Sequencing,
    /// Complete a passage with missing words.
    FillInBlank,
    /// Open response to a prompt.
    FreeWrite,
}

impl ExerciseKind {
    /// Order in which consecutive generations for a level cycle through kinds.
    pub const ROTATION: [ExerciseKind; 4] = [
        ExerciseKind::Rewrite,
        ExerciseKind::Sequencing,
        ExerciseKind::FillInBlank,
        ExerciseKind::FreeWrite,
    ];

    /// Kind used for the `generation`-th exercise of a level.
    pub fn for_generation(generation: u32) -> Self {
        Self::ROTATION[generation as usize % Self::ROTATION.len()]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseKind::Rewrite => "rewrite",
            ExerciseKind::Sequencing => "sequencing",
            ExerciseKind::FillInBlank => "fill_in_blank",
            ExerciseKind::FreeWrite => "free_write",
        }
    }
}

impl fmt::Display for ExerciseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a generator needs to produce one exercise.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub level_id: LevelId,
    /// Level type, used to pick the generation prompt.
    pub category: Category,
    pub topic: String,
    pub kind: ExerciseKind,
    pub difficulty: u8,
}

/// A generated exercise as cached for a level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseRecord {
    pub id: Uuid,
    pub level_id: LevelId,
    pub kind: ExerciseKind,
    pub topic: String,
    pub prompt: String,
    #[serde(default)]
    pub instructions: String,
    pub difficulty: u8,
    pub created_at: DateTime<Utc>,
    /// Produced from static content instead of the live generator.
    #[serde(default)]
    pub fallback: bool,
}

impl ExerciseRecord {
    /// Builds a record answering `request`.
    pub fn new(request: &GenerationRequest, prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            level_id: request.level_id.clone(),
            kind: request.kind,
            topic: request.topic.clone(),
            prompt: prompt.into(),
            instructions: String::new(),
            difficulty: request.difficulty,
            created_at: Utc::now(),
            fallback: false,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn as_fallback(mut self) -> Self {
        self.fallback = true;
        self
    }
}

/// Where a level sits in its cache lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelCacheState {
    Empty,
    Generating,
    HasExercises,
    /// At the per-level maximum.
    Full,
}

/// Result of [`preload_first_exercise_if_needed`](crate::ExerciseScheduler::preload_first_exercise_if_needed).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FirstExercise {
    Generated(ExerciseRecord),
    /// The level already had at least one exercise.
    AlreadyCached,
    /// Another call or a background task is generating for the level.
    InFlight,
}

/// A registered background prefetch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationTask {
    pub id: Uuid,
    pub level_id: LevelId,
    /// Cache size the task fills the level up to.
    pub target_count: usize,
    pub start_time: DateTime<Utc>,
    /// Set once the task has been resumed after a restart.
    #[serde(default)]
    pub resume_attempted: bool,
}

impl GenerationTask {
    pub fn new(level_id: LevelId, target_count: usize) -> Self {
        Self {
            id: Uuid::now_v7(),
            level_id,
            target_count,
            start_time: Utc::now(),
            resume_attempted: false,
        }
    }
}
