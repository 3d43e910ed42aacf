//! Core types shared across the Quillpath crates.
//!
//! - [`LevelId`] and [`Category`] identify positions in the curriculum
//! - [`ProgressState`] is the learner's full progression record
//! - [`ProgressField`] names the fields tracked for delta sync

mod level;
mod progress;

pub use level::{Category, LevelId};
pub use progress::{COMPLETE, ProgressField, ProgressState, UnlockedAchievement};
