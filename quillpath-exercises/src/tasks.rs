//! Registry of background generation tasks.

use crate::types::GenerationTask;
use quillpath_types::LevelId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Active tasks, at most one per level.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRegistry {
    #[serde(default)]
    tasks: BTreeMap<LevelId, GenerationTask>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, level_id: &str) -> Option<&GenerationTask> {
        self.tasks.get(level_id)
    }

    pub fn has_active(&self, level_id: &str) -> bool {
        self.tasks.contains_key(level_id)
    }

    /// Whether `task` is still the registered task for its level.
    pub fn is_current(&self, task: &GenerationTask) -> bool {
        self.tasks
            .get(task.level_id.as_str())
            .is_some_and(|registered| registered.id == task.id)
    }

    /// Registers `task`. Returns false if its level already has one.
    pub fn register(&mut self, task: GenerationTask) -> bool {
        if self.tasks.contains_key(task.level_id.as_str()) {
            return false;
        }
        self.tasks.insert(task.level_id.clone(), task);
        true
    }

    /// Removes the task for `level_id`, whatever its id.
    pub fn remove(&mut self, level_id: &str) -> Option<GenerationTask> {
        self.tasks.remove(level_id)
    }

    /// Removes `id` only if it is still the level's registered task.
    pub fn finish(&mut self, level_id: &str, id: Uuid) -> bool {
        if self.tasks.get(level_id).is_some_and(|task| task.id == id) {
            self.tasks.remove(level_id);
            return true;
        }
        false
    }

    /// Claims the tasks listed in `interrupted` for resumption.
    ///
    /// Listed tasks never resumed are flagged and returned. Listed tasks
    /// that were already resumed once were interrupted again and are
    /// dropped. Tasks not listed, or no longer registered, are untouched.
    pub fn claim_for_resume(
        &mut self,
        interrupted: &[Uuid],
    ) -> (Vec<GenerationTask>, Vec<GenerationTask>) {
        let (retry, abandon): (Vec<_>, Vec<_>) = self
            .tasks
            .values()
            .filter(|task| interrupted.contains(&task.id))
            .cloned()
            .partition(|task| !task.resume_attempted);
        for task in &abandon {
            self.tasks.remove(task.level_id.as_str());
        }
        let resumed = retry
            .into_iter()
            .map(|mut task| {
                task.resume_attempted = true;
                self.tasks.insert(task.level_id.clone(), task.clone());
                task
            })
            .collect();
        (resumed, abandon)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GenerationTask> {
        self.tasks.values()
    }
}
