use chrono::NaiveDate;
use quillpath_types::{LevelId, ProgressField, UnlockedAchievement};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Consequences of a mutation beyond the field it set directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnlockReport {
    pub completed: Vec<LevelId>,
    pub unlocked: Vec<LevelId>,
    /// Level the learner was moved onto, if any.
    pub advanced_to: Option<LevelId>,
    /// Achievements awarded automatically.
    pub achievements: Vec<String>,
}

impl UnlockReport {
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
            && self.unlocked.is_empty()
            && self.advanced_to.is_none()
            && self.achievements.is_empty()
    }
}

/// Result of a ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied(UnlockReport),
    /// Idempotent no-op: the state already reflected the request.
    Unchanged,
    /// The level id is not part of the curriculum.
    UnknownLevel,
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied(_))
    }

    pub fn report(&self) -> Option<&UnlockReport> {
        match self {
            MutationOutcome::Applied(report) => Some(report),
            _ => None,
        }
    }
}

/// Partial state for bulk restoration. Present fields overwrite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressPatch {
    pub current_level_id: Option<LevelId>,
    pub level_progress: Option<BTreeMap<LevelId, u8>>,
    pub completed_levels: Option<BTreeSet<LevelId>>,
    pub unlocked_levels: Option<BTreeSet<LevelId>>,
    pub total_score: Option<u64>,
    pub daily_streak: Option<u32>,
    pub last_active_on: Option<NaiveDate>,
    pub achievements: Option<BTreeMap<String, UnlockedAchievement>>,
}

/// Everything a mutation touched, gathered while the state lock is held.
#[derive(Debug, Default)]
pub(crate) struct Changes {
    pub fields: BTreeSet<ProgressField>,
    /// The next push must carry the whole document.
    pub full: bool,
    pub report: UnlockReport,
}

impl Changes {
    pub fn touch(&mut self, field: ProgressField) {
        self.fields.insert(field);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && !self.full
    }
}
