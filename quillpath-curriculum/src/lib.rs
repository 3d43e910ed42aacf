//! Curriculum graph for Quillpath.
//!
//! A read-only lookup structure over the prerequisite DAG of levels:
//! - Successor lookup (`next_level`) for advancing the learner
//! - Category gates driven by configurable progress thresholds
//! - The achievement catalog and XP rank curve

mod achievements;
mod config;
mod error;
mod graph;
mod standard;

pub use achievements::{Achievement, AchievementCatalog, AchievementRule};
pub use config::{CategoryGate, CurriculumConfig, XpCurve};
pub use error::{CurriculumError, CurriculumResult};
pub use graph::{Curriculum, Level};
