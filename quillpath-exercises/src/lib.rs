//! Exercise cache and generation scheduler for Quillpath.
//!
//! Makes sure the learner never waits on an empty level:
//! - A per-level cache of generated exercises, capped and purged when stale
//! - Single-flight foreground generation of a level's first exercise
//! - Background backfill tasks that survive a restart and resume once
//! - Priority ordering: current level, next unlocked level, then backfill
//!
//! Generation itself is delegated to an [`ExerciseGenerator`].

mod cache;
mod config;
mod error;
mod generator;
mod scheduler;
mod tasks;
mod types;

pub use cache::{CacheEntry, ExerciseCache};
pub use config::SchedulerConfig;
pub use error::{ExerciseError, ExerciseResult, GeneratorError};
pub use generator::{ExerciseGenerator, StaticGenerator};
pub use scheduler::{ExerciseScheduler, CACHE_KEY, TASKS_KEY};
pub use tasks::TaskRegistry;
pub use types::{
    ExerciseKind, ExerciseRecord, FirstExercise, GenerationRequest, GenerationTask,
    LevelCacheState,
};
