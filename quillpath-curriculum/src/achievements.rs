//! Static achievement catalog.

use crate::graph::Curriculum;
use quillpath_types::{Category, ProgressState};

/// Condition under which an achievement is awarded automatically.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AchievementRule {
    /// Awarded only through an explicit unlock.
    Manual,
    /// Any level completed.
    FirstCompletion,
    /// Every level in the category completed.
    CategoryMastered(Category),
    StreakAtLeast(u32),
    ScoreAtLeast(u64),
}

/// Immutable catalog entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub rule: AchievementRule,
}

impl Achievement {
    pub fn new(id: &str, title: &str, description: &str, icon: &str, rule: AchievementRule) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
            rule,
        }
    }

    /// Whether the rule holds for the given state.
    pub fn is_earned(&self, progress: &ProgressState, curriculum: &Curriculum) -> bool {
        match &self.rule {
            AchievementRule::Manual => false,
            AchievementRule::FirstCompletion => !progress.completed_levels.is_empty(),
            AchievementRule::CategoryMastered(category) => {
                curriculum.is_category_mastered(*category, progress)
            }
            AchievementRule::StreakAtLeast(days) => progress.daily_streak >= *days,
            AchievementRule::ScoreAtLeast(score) => progress.total_score >= *score,
        }
    }
}

/// Lookup table of every achievement a learner can earn.
#[derive(Clone, Debug, Default)]
pub struct AchievementCatalog {
    entries: Vec<Achievement>,
}

impl AchievementCatalog {
    pub fn new(entries: Vec<Achievement>) -> Self {
        Self { entries }
    }

    pub fn standard() -> Self {
        Self::new(vec![
            Achievement::new(
                "first-steps",
                "First Steps",
                "Complete your first level",
                "footprints",
                AchievementRule::FirstCompletion,
            ),
            Achievement::new(
                "mechanics-master",
                "Mechanic",
                "Complete every mechanics level",
                "wrench",
                AchievementRule::CategoryMastered(Category::Mechanics),
            ),
            Achievement::new(
                "sequencing-master",
                "Architect",
                "Complete every sequencing level",
                "blocks",
                AchievementRule::CategoryMastered(Category::Sequencing),
            ),
            Achievement::new(
                "voice-master",
                "Stylist",
                "Complete every voice level",
                "feather",
                AchievementRule::CategoryMastered(Category::Voice),
            ),
            Achievement::new(
                "week-streak",
                "Seven Days Strong",
                "Practice seven days in a row",
                "flame",
                AchievementRule::StreakAtLeast(7),
            ),
            Achievement::new(
                "high-scorer",
                "High Scorer",
                "Earn 1000 points",
                "star",
                AchievementRule::ScoreAtLeast(1000),
            ),
            Achievement::new(
                "project-started",
                "Blank Page Beaten",
                "Start your first free-form writing project",
                "notebook",
                AchievementRule::Manual,
            ),
        ])
    }

    pub fn get(&self, id: &str) -> Option<&Achievement> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Achievement> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose rule holds but which the learner does not have yet.
    pub fn newly_earned<'a>(
        &'a self,
        progress: &'a ProgressState,
        curriculum: &'a Curriculum,
    ) -> impl Iterator<Item = &'a Achievement> + 'a {
        self.entries.iter().filter(move |entry| {
            !progress.has_achievement(&entry.id) && entry.is_earned(progress, curriculum)
        })
    }
}
