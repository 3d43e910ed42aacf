//! Completion and unlock rules over a [`ProgressState`].

use crate::outcome::Changes;
use quillpath_curriculum::Curriculum;
use quillpath_types::{Category, LevelId, ProgressField, ProgressState, COMPLETE};

/// Marks a level completed with full progress. Returns false if it already was.
pub(crate) fn complete(state: &mut ProgressState, level: &LevelId, changes: &mut Changes) -> bool {
    if state.is_completed(level.as_str()) {
        return false;
    }
    state.completed_levels.insert(level.clone());
    state.level_progress.insert(level.clone(), COMPLETE);
    changes.touch(ProgressField::CompletedLevels);
    changes.touch(ProgressField::LevelProgress);
    changes.report.completed.push(level.clone());
    true
}

/// Adds a level to the unlocked set. Returns false if it already was.
pub(crate) fn unlock(state: &mut ProgressState, level: &LevelId, changes: &mut Changes) -> bool {
    if !state.unlocked_levels.insert(level.clone()) {
        return false;
    }
    changes.touch(ProgressField::UnlockedLevels);
    changes.report.unlocked.push(level.clone());
    true
}

/// Runs the unlock rules until nothing changes.
///
/// A single pass can expose more work (e.g. advancing onto a level that
/// already holds full progress), so the rules repeat to a fixed point.
/// Each productive pass unlocks or completes at least one level, which
/// bounds the loop by the curriculum size.
pub(crate) fn evaluate(state: &mut ProgressState, curriculum: &Curriculum, changes: &mut Changes) {
    let limit = curriculum.levels().len() * 2 + 1;
    for _ in 0..limit {
        if !evaluate_once(state, curriculum, changes) {
            break;
        }
    }
}

fn evaluate_once(state: &mut ProgressState, curriculum: &Curriculum, changes: &mut Changes) -> bool {
    let mut changed = false;
    let current = state.current_level_id.clone();

    if state.progress_of(current.as_str()) >= COMPLETE {
        changed |= complete(state, &current, changes);
    }

    // A successor opened earlier by a category gate is still moved onto
    // when the current level was completed by this mutation.
    if state.is_completed(current.as_str()) {
        if let Some(next) = curriculum.next_level(current.as_str()) {
            let just_completed = changes.report.completed.contains(&current);
            if !state.is_unlocked(next.id.as_str()) || just_completed {
                unlock(state, &next.id, changes);
                advance(state, &next.id, changes);
                changed = true;
            }
        }
    }

    for category in Category::ALL {
        if !curriculum.is_category_unlocked(category, state) {
            continue;
        }
        if let Some(first) = curriculum.first_level_of(category) {
            changed |= unlock(state, &first.id, changes);
        }
    }

    changed
}

/// Moves the learner onto `level`, starting its progress at 0 unless some
/// was already recorded.
fn advance(state: &mut ProgressState, level: &LevelId, changes: &mut Changes) {
    state.current_level_id = level.clone();
    changes.touch(ProgressField::CurrentLevel);
    changes.report.advanced_to = Some(level.clone());
    if !state.level_progress.contains_key(level.as_str()) {
        state.level_progress.insert(level.clone(), 0);
        changes.touch(ProgressField::LevelProgress);
    }
}

/// Restores the unlock invariants after a bulk overwrite.
pub(crate) fn normalize(state: &mut ProgressState, curriculum: &Curriculum, changes: &mut Changes) {
    let default = curriculum.default_level().clone();
    unlock(state, &default, changes);
    let current = state.current_level_id.clone();
    unlock(state, &current, changes);
    for level in state.completed_levels.clone() {
        if state.progress_of(level.as_str()) != COMPLETE {
            state.level_progress.insert(level, COMPLETE);
            changes.touch(ProgressField::LevelProgress);
        }
    }
}
