//! Application configuration.

use crate::error::{AppError, AppResult};
use quillpath_curriculum::CurriculumConfig;
use quillpath_exercises::SchedulerConfig;
use quillpath_sync::SyncConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration of the core services.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Learner whose documents are synced.
    pub learner_id: String,

    /// Directory for persisted state. In-memory storage when absent.
    pub data_dir: Option<PathBuf>,

    pub curriculum: CurriculumConfig,
    pub sync: SyncConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            learner_id: "local".to_string(),
            data_dir: None,
            curriculum: CurriculumConfig::default(),
            sync: SyncConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parses a JSON config. Missing sections take their defaults.
    pub fn from_json_str(json: &str) -> AppResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.learner_id.trim().is_empty() {
            return Err(AppError::InvalidConfig("learner_id is empty".into()));
        }
        if self.scheduler.max_per_level == 0 {
            return Err(AppError::InvalidConfig(
                "scheduler.max_per_level must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
