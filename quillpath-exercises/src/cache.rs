//! Per-level exercise cache.

use crate::types::{ExerciseKind, ExerciseRecord};
use chrono::{DateTime, Duration, Utc};
use quillpath_types::LevelId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cached exercises of one level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub exercises: Vec<ExerciseRecord>,
    pub last_updated: DateTime<Utc>,
    /// Exercises requested so far; drives kind rotation.
    #[serde(default)]
    pub generation_count: u32,
}

impl CacheEntry {
    fn new() -> Self {
        Self {
            exercises: Vec::new(),
            last_updated: Utc::now(),
            generation_count: 0,
        }
    }
}

/// All cached exercises, keyed by level.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseCache {
    #[serde(default)]
    entries: BTreeMap<LevelId, CacheEntry>,
}

impl ExerciseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, level_id: &str) -> Option<&CacheEntry> {
        self.entries.get(level_id)
    }

    pub fn count(&self, level_id: &str) -> usize {
        self.entries
            .get(level_id)
            .map_or(0, |entry| entry.exercises.len())
    }

    pub fn exercises(&self, level_id: &str) -> &[ExerciseRecord] {
        self.entries
            .get(level_id)
            .map(|entry| entry.exercises.as_slice())
            .unwrap_or_default()
    }

    pub fn get(&self, level_id: &str, index: usize) -> Option<&ExerciseRecord> {
        self.exercises(level_id).get(index)
    }

    /// Picks the kind for the next generation and advances the rotation.
    pub fn next_kind(&mut self, level_id: &LevelId) -> ExerciseKind {
        let entry = self
            .entries
            .entry(level_id.clone())
            .or_insert_with(CacheEntry::new);
        let kind = ExerciseKind::for_generation(entry.generation_count);
        entry.generation_count = entry.generation_count.wrapping_add(1);
        kind
    }

    /// Appends `record` unless the level already holds `max` exercises.
    pub fn push(&mut self, level_id: &LevelId, record: ExerciseRecord, max: usize) -> bool {
        let entry = self
            .entries
            .entry(level_id.clone())
            .or_insert_with(CacheEntry::new);
        if entry.exercises.len() >= max {
            return false;
        }
        entry.exercises.push(record);
        entry.last_updated = Utc::now();
        true
    }

    /// Drops every entry last updated before `now - retention`. Returns the
    /// number of levels purged.
    pub fn purge_older_than(&mut self, retention: Duration, now: DateTime<Utc>) -> usize {
        let cutoff = now - retention;
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.last_updated >= cutoff);
        before - self.entries.len()
    }

    /// Removes a level's exercises. Returns how many were dropped.
    pub fn clear_level(&mut self, level_id: &str) -> usize {
        self.entries
            .remove(level_id)
            .map_or(0, |entry| entry.exercises.len())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn levels(&self) -> impl Iterator<Item = &LevelId> {
        self.entries.keys()
    }
}
