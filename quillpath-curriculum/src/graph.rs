//! Prerequisite DAG over curriculum levels.

use crate::achievements::AchievementCatalog;
use crate::config::{CategoryGate, CurriculumConfig, XpCurve};
use crate::error::{CurriculumError, CurriculumResult};
use quillpath_types::{Category, LevelId, ProgressState};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};

/// A single curriculum level. Immutable once the curriculum is built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub id: LevelId,
    #[serde(default)]
    pub title: String,
    /// Subject handed to the exercise generator.
    #[serde(default)]
    pub topic: String,
    pub category: Category,
    pub difficulty: u8,
    #[serde(default)]
    pub prerequisites: BTreeSet<LevelId>,
    /// Tie-break within the category.
    #[serde(default)]
    pub order: u32,
}

impl Level {
    pub fn new(id: impl Into<LevelId>, category: Category, difficulty: u8, order: u32) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            topic: String::new(),
            category,
            difficulty,
            prerequisites: BTreeSet::new(),
            order,
        }
    }

    pub fn titled(mut self, title: impl Into<String>, topic: impl Into<String>) -> Self {
        self.title = title.into();
        self.topic = topic.into();
        self
    }

    pub fn requires(mut self, level: impl Into<LevelId>) -> Self {
        self.prerequisites.insert(level.into());
        self
    }
}

/// Read-only curriculum lookup structure.
#[derive(Clone, Debug)]
pub struct Curriculum {
    /// Levels in declaration order.
    levels: Vec<Level>,
    index: HashMap<LevelId, usize>,
    gates: Vec<CategoryGate>,
    default_level: LevelId,
    xp_curve: XpCurve,
    achievements: AchievementCatalog,
}

impl Curriculum {
    /// Builds the built-in writing curriculum.
    pub fn standard() -> Self {
        Self::build(CurriculumConfig::default())
    }

    /// Validates a definition and builds the curriculum from it.
    pub fn new(config: CurriculumConfig) -> CurriculumResult<Self> {
        validate(&config)?;
        Ok(Self::build(config))
    }

    fn build(config: CurriculumConfig) -> Self {
        let index = config
            .levels
            .iter()
            .enumerate()
            .map(|(i, level)| (level.id.clone(), i))
            .collect();
        Self {
            levels: config.levels,
            index,
            gates: config.gates,
            default_level: config.default_level,
            xp_curve: config.xp_curve,
            achievements: AchievementCatalog::standard(),
        }
    }

    /// Replaces the achievement catalog.
    pub fn with_achievements(mut self, catalog: AchievementCatalog) -> Self {
        self.achievements = catalog;
        self
    }

    pub fn level(&self, id: &str) -> Option<&Level> {
        self.index.get(id).map(|&i| &self.levels[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn default_level(&self) -> &LevelId {
        &self.default_level
    }

    pub fn xp_curve(&self) -> &XpCurve {
        &self.xp_curve
    }

    pub fn achievements(&self) -> &AchievementCatalog {
        &self.achievements
    }

    /// The easiest level that lists `id` as a prerequisite.
    ///
    /// Ties on difficulty go to the level declared first. `None` means `id`
    /// is the end of the curriculum.
    pub fn next_level(&self, id: &str) -> Option<&Level> {
        self.levels
            .iter()
            .enumerate()
            .filter(|(_, level)| level.prerequisites.contains(id))
            .min_by_key(|(i, level)| (level.difficulty, *i))
            .map(|(_, level)| level)
    }

    /// Levels of a category, easiest first.
    pub fn levels_in(&self, category: Category) -> Vec<&Level> {
        let mut levels: Vec<(usize, &Level)> = self
            .levels
            .iter()
            .enumerate()
            .filter(|(_, level)| level.category == category)
            .collect();
        levels.sort_by_key(|(i, level)| (level.difficulty, level.order, *i));
        levels.into_iter().map(|(_, level)| level).collect()
    }

    /// Entry level of a category.
    pub fn first_level_of(&self, category: Category) -> Option<&Level> {
        self.levels_in(category).into_iter().next()
    }

    pub fn gate_for(&self, category: Category) -> Option<&CategoryGate> {
        self.gates.iter().find(|gate| gate.category == category)
    }

    /// Whether the learner has opened `category`.
    ///
    /// The first category is always open; so is any category without a
    /// configured gate.
    pub fn is_category_unlocked(&self, category: Category, progress: &ProgressState) -> bool {
        if category == Category::first() {
            return true;
        }
        match self.gate_for(category) {
            Some(gate) => progress.progress_of(gate.gate_level.as_str()) >= gate.threshold,
            None => true,
        }
    }

    /// Whether every level of `category` is completed.
    pub fn is_category_mastered(&self, category: Category, progress: &ProgressState) -> bool {
        let levels = self.levels_in(category);
        !levels.is_empty()
            && levels
                .iter()
                .all(|level| progress.is_completed(level.id.as_str()))
    }
}

fn validate(config: &CurriculumConfig) -> CurriculumResult<()> {
    let mut ids: HashMap<&LevelId, &Level> = HashMap::new();
    for level in &config.levels {
        if ids.insert(&level.id, level).is_some() {
            return Err(CurriculumError::DuplicateLevel(level.id.clone()));
        }
    }

    for level in &config.levels {
        if let Some(missing) = level.prerequisites.iter().find(|p| !ids.contains_key(p)) {
            return Err(CurriculumError::UnknownPrerequisite {
                level: level.id.clone(),
                missing: missing.clone(),
            });
        }
    }

    match ids.get(&config.default_level) {
        None => return Err(CurriculumError::UnknownDefaultLevel(config.default_level.clone())),
        Some(level) if !level.prerequisites.is_empty() => {
            return Err(CurriculumError::GatedDefaultLevel(config.default_level.clone()));
        }
        Some(_) => {}
    }

    for gate in &config.gates {
        if !ids.contains_key(&gate.gate_level) {
            return Err(CurriculumError::UnknownGateLevel {
                category: gate.category.to_string(),
                level: gate.gate_level.clone(),
            });
        }
        if gate.threshold > 100 {
            return Err(CurriculumError::InvalidThreshold(gate.threshold));
        }
    }

    check_acyclic(&config.levels)
}

/// Kahn's algorithm: every level must be reachable by peeling off levels
/// whose prerequisites are already resolved.
fn check_acyclic(levels: &[Level]) -> CurriculumResult<()> {
    let mut pending: HashMap<&LevelId, usize> = levels
        .iter()
        .map(|level| (&level.id, level.prerequisites.len()))
        .collect();
    let mut ready: VecDeque<&LevelId> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut resolved = 0;

    while let Some(id) = ready.pop_front() {
        resolved += 1;
        for level in levels.iter().filter(|l| l.prerequisites.contains(id)) {
            if let Some(count) = pending.get_mut(&level.id) {
                *count -= 1;
                if *count == 0 {
                    ready.push_back(&level.id);
                }
            }
        }
    }

    if resolved == levels.len() {
        return Ok(());
    }
    let stuck = levels
        .iter()
        .find(|level| pending.get(&level.id).is_some_and(|count| *count > 0))
        .map(|level| level.id.clone())
        .unwrap_or_else(|| LevelId::new("?"));
    Err(CurriculumError::Cycle(stuck))
}
