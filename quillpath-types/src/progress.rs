use crate::level::LevelId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Progress percentage at which a level counts as complete.
pub const COMPLETE: u8 = 100;

/// An achievement the learner has earned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockedAchievement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub unlocked_at: DateTime<Utc>,
}

/// The learner's full progression record.
///
/// Invariants maintained by the ledger:
/// - `current_level_id` is always in `unlocked_levels`
/// - every completed level has progress 100
/// - per-level progress, `completed_levels`, `unlocked_levels`,
///   `achievements` and `total_score` never shrink outside of a reset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub current_level_id: LevelId,
    #[serde(default)]
    pub level_progress: BTreeMap<LevelId, u8>,
    #[serde(default)]
    pub completed_levels: BTreeSet<LevelId>,
    #[serde(default)]
    pub unlocked_levels: BTreeSet<LevelId>,
    /// Accumulated score; also the XP that drives the learner's rank.
    #[serde(default)]
    pub total_score: u64,
    #[serde(default)]
    pub daily_streak: u32,
    #[serde(default)]
    pub last_active_on: Option<NaiveDate>,
    #[serde(default)]
    pub achievements: BTreeMap<String, UnlockedAchievement>,
    pub last_updated: DateTime<Utc>,
}

impl ProgressState {
    /// Fresh state positioned on the curriculum's entry level.
    pub fn initial(default_level: LevelId) -> Self {
        let mut level_progress = BTreeMap::new();
        level_progress.insert(default_level.clone(), 0);
        let mut unlocked_levels = BTreeSet::new();
        unlocked_levels.insert(default_level.clone());
        Self {
            current_level_id: default_level,
            level_progress,
            completed_levels: BTreeSet::new(),
            unlocked_levels,
            total_score: 0,
            daily_streak: 0,
            last_active_on: None,
            achievements: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }

    /// Recorded progress for a level, 0 when never touched.
    pub fn progress_of(&self, level_id: &str) -> u8 {
        self.level_progress.get(level_id).copied().unwrap_or(0)
    }

    pub fn is_completed(&self, level_id: &str) -> bool {
        self.completed_levels.contains(level_id)
    }

    pub fn is_unlocked(&self, level_id: &str) -> bool {
        self.unlocked_levels.contains(level_id)
    }

    pub fn has_achievement(&self, id: &str) -> bool {
        self.achievements.contains_key(id)
    }

    /// Stamps `last_updated` with the current time.
    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

/// Top-level fields of [`ProgressState`], named as they serialize.
///
/// Used to record which parts of the state changed since the last
/// confirmed sync so a partial push can carry only those.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProgressField {
    CurrentLevel,
    LevelProgress,
    CompletedLevels,
    UnlockedLevels,
    TotalScore,
    DailyStreak,
    LastActiveOn,
    Achievements,
    LastUpdated,
}

impl ProgressField {
    pub const ALL: [ProgressField; 9] = [
        ProgressField::CurrentLevel,
        ProgressField::LevelProgress,
        ProgressField::CompletedLevels,
        ProgressField::UnlockedLevels,
        ProgressField::TotalScore,
        ProgressField::DailyStreak,
        ProgressField::LastActiveOn,
        ProgressField::Achievements,
        ProgressField::LastUpdated,
    ];

    /// Serialized key of the field.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressField::CurrentLevel => "current_level_id",
            ProgressField::LevelProgress => "level_progress",
            ProgressField::CompletedLevels => "completed_levels",
            ProgressField::UnlockedLevels => "unlocked_levels",
            ProgressField::TotalScore => "total_score",
            ProgressField::DailyStreak => "daily_streak",
            ProgressField::LastActiveOn => "last_active_on",
            ProgressField::Achievements => "achievements",
            ProgressField::LastUpdated => "last_updated",
        }
    }
}

impl fmt::Display for ProgressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
