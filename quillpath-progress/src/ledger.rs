//! The progress ledger.

use crate::outcome::{Changes, MutationOutcome, ProgressPatch, UnlockReport};
use crate::unlock;
use chrono::{NaiveDate, Utc};
use quillpath_curriculum::{Achievement, Curriculum, Level};
use quillpath_storage::{load_versioned, save_versioned, LoadResult, Storage};
use quillpath_sync::{SyncOutcome, SyncReconciler};
use quillpath_types::{LevelId, ProgressField, ProgressState, UnlockedAchievement, COMPLETE};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// Storage key of the persisted progress state.
pub const PROGRESS_KEY: &str = "progress-state";
const PROGRESS_VERSION: u32 = 1;

/// Outcome of a single mutation step, before the report is attached.
enum Step {
    Applied,
    Unchanged,
    UnknownLevel,
}

/// Learner progress store. Clones share the same state.
#[derive(Clone)]
pub struct ProgressLedger {
    inner: Arc<Inner>,
}

struct Inner {
    curriculum: Arc<Curriculum>,
    storage: Arc<dyn Storage>,
    reconciler: SyncReconciler,
    state: Arc<Mutex<ProgressState>>,
    restored: bool,
}

impl ProgressLedger {
    /// Loads the persisted state, falling back to the initial state when
    /// nothing is stored or the blob is corrupt.
    pub fn load(
        curriculum: Arc<Curriculum>,
        storage: Arc<dyn Storage>,
        reconciler: SyncReconciler,
    ) -> Self {
        let loaded: LoadResult<ProgressState> =
            load_versioned(storage.as_ref(), PROGRESS_KEY, PROGRESS_VERSION);
        let restored = loaded.is_loaded();
        if matches!(loaded, LoadResult::Corrupt) {
            warn!("progress state was corrupt, starting from defaults");
        }
        let mut state =
            loaded.unwrap_or_else(|| ProgressState::initial(curriculum.default_level().clone()));
        unlock::normalize(&mut state, &curriculum, &mut Changes::default());

        Self {
            inner: Arc::new(Inner {
                curriculum,
                storage,
                reconciler,
                state: Arc::new(Mutex::new(state)),
                restored,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the state came from local storage rather than defaults.
    pub fn restored_from_storage(&self) -> bool {
        self.inner.restored
    }

    pub fn curriculum(&self) -> &Arc<Curriculum> {
        &self.inner.curriculum
    }

    pub fn reconciler(&self) -> &SyncReconciler {
        &self.inner.reconciler
    }

    // ── Reads ───────────────────────────────────────────────────

    pub fn snapshot(&self) -> ProgressState {
        self.lock().clone()
    }

    pub fn snapshot_json(&self) -> Value {
        state_to_json(&self.lock())
    }

    pub fn current_level(&self) -> LevelId {
        self.lock().current_level_id.clone()
    }

    pub fn progress_of(&self, level_id: &str) -> u8 {
        self.lock().progress_of(level_id)
    }

    pub fn is_level_unlocked(&self, level_id: &str) -> bool {
        self.lock().is_unlocked(level_id)
    }

    pub fn is_level_completed(&self, level_id: &str) -> bool {
        self.lock().is_completed(level_id)
    }

    /// Learner rank on the configured XP curve.
    pub fn rank(&self) -> u32 {
        let score = self.lock().total_score;
        self.inner.curriculum.xp_curve().rank_for(score)
    }

    pub fn next_level(&self, level_id: &str) -> Option<&Level> {
        self.inner.curriculum.next_level(level_id)
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.reconciler.is_dirty()
    }

    // ── Mutations ───────────────────────────────────────────────

    /// Overwrites the fields present in `patch`. Used for bulk restoration;
    /// the next push is a full one.
    pub fn set_progress(&self, patch: ProgressPatch) -> MutationOutcome {
        self.mutate(|state, curriculum, changes| {
            let mut any = false;
            if let Some(current) = patch.current_level_id {
                state.current_level_id = current;
                changes.touch(ProgressField::CurrentLevel);
                any = true;
            }
            if let Some(progress) = patch.level_progress {
                state.level_progress = progress
                    .into_iter()
                    .map(|(id, value)| (id, value.min(COMPLETE)))
                    .collect();
                changes.touch(ProgressField::LevelProgress);
                any = true;
            }
            if let Some(completed) = patch.completed_levels {
                state.completed_levels = completed;
                changes.touch(ProgressField::CompletedLevels);
                any = true;
            }
            if let Some(unlocked) = patch.unlocked_levels {
                state.unlocked_levels = unlocked;
                changes.touch(ProgressField::UnlockedLevels);
                any = true;
            }
            if let Some(score) = patch.total_score {
                state.total_score = score;
                changes.touch(ProgressField::TotalScore);
                any = true;
            }
            if let Some(streak) = patch.daily_streak {
                state.daily_streak = streak;
                changes.touch(ProgressField::DailyStreak);
                any = true;
            }
            if let Some(day) = patch.last_active_on {
                state.last_active_on = Some(day);
                changes.touch(ProgressField::LastActiveOn);
                any = true;
            }
            if let Some(achievements) = patch.achievements {
                state.achievements = achievements;
                changes.touch(ProgressField::Achievements);
                any = true;
            }
            if !any {
                return Step::Unchanged;
            }
            unlock::normalize(state, curriculum, changes);
            changes.full = true;
            Step::Applied
        })
    }

    /// Marks a level completed and applies the unlock rules.
    pub fn complete_level(&self, level_id: &str) -> MutationOutcome {
        self.mutate(|state, curriculum, changes| {
            let Some(level) = curriculum.level(level_id) else {
                return Step::UnknownLevel;
            };
            if !unlock::complete(state, &level.id, changes) {
                return Step::Unchanged;
            }
            unlock::evaluate(state, curriculum, changes);
            Step::Applied
        })
    }

    /// Makes a level available without completing anything.
    pub fn unlock_level(&self, level_id: &str) -> MutationOutcome {
        self.mutate(|state, curriculum, changes| {
            let Some(level) = curriculum.level(level_id) else {
                return Step::UnknownLevel;
            };
            if unlock::unlock(state, &level.id, changes) {
                Step::Applied
            } else {
                Step::Unchanged
            }
        })
    }

    /// Records progress on a level. Values at or below the recorded
    /// progress are ignored; values above 100 are clamped.
    pub fn update_category_progress(&self, level_id: &str, value: u8) -> MutationOutcome {
        self.mutate(|state, curriculum, changes| {
            let Some(level) = curriculum.level(level_id) else {
                return Step::UnknownLevel;
            };
            let value = value.min(COMPLETE);
            if value <= state.progress_of(level_id) {
                return Step::Unchanged;
            }
            state.level_progress.insert(level.id.clone(), value);
            changes.touch(ProgressField::LevelProgress);
            unlock::evaluate(state, curriculum, changes);
            Step::Applied
        })
    }

    pub fn add_score(&self, amount: u64) -> MutationOutcome {
        self.mutate(|state, _, changes| {
            if amount == 0 {
                return Step::Unchanged;
            }
            state.total_score = state.total_score.saturating_add(amount);
            changes.touch(ProgressField::TotalScore);
            Step::Applied
        })
    }

    pub fn increment_streak(&self) -> MutationOutcome {
        self.mutate(|state, _, changes| {
            state.daily_streak = state.daily_streak.saturating_add(1);
            changes.touch(ProgressField::DailyStreak);
            Step::Applied
        })
    }

    /// Records practice on `today`: the same day is a no-op, the following
    /// day extends the streak, and a longer gap restarts it at 1.
    pub fn record_daily_activity(&self, today: NaiveDate) -> MutationOutcome {
        self.mutate(|state, _, changes| {
            let streak = match state.last_active_on {
                Some(last) if last >= today => return Step::Unchanged,
                Some(last) if last.succ_opt() == Some(today) => state.daily_streak.saturating_add(1),
                _ => 1,
            };
            state.last_active_on = Some(today);
            changes.touch(ProgressField::LastActiveOn);
            if streak != state.daily_streak {
                state.daily_streak = streak;
                changes.touch(ProgressField::DailyStreak);
            }
            Step::Applied
        })
    }

    /// Awards a catalog achievement. `None` if the id is unknown or the
    /// learner already has it.
    pub fn unlock_achievement(&self, id: &str) -> Option<UnlockedAchievement> {
        let (awarded, _) = self.apply(|state, curriculum, changes| {
            let achievement = curriculum.achievements().get(id)?;
            if state.has_achievement(id) {
                return None;
            }
            Some(award(state, achievement, changes))
        });
        awarded
    }

    /// Replaces the state with the initial default. Development and test
    /// flows only.
    pub fn reset_progress(&self) -> MutationOutcome {
        self.mutate(|state, curriculum, changes| {
            *state = ProgressState::initial(curriculum.default_level().clone());
            for field in ProgressField::ALL {
                changes.touch(field);
            }
            changes.full = true;
            Step::Applied
        })
    }

    /// Adopts a document pulled from the remote store as the local state.
    ///
    /// The remote copy is normalized first. Fields that normalization had to
    /// repair are marked dirty so the fix reaches the remote store too;
    /// otherwise the state stays clean.
    pub fn restore_from_remote(&self, mut remote: ProgressState) {
        let curriculum = &self.inner.curriculum;
        let mut changes = Changes::default();
        unlock::normalize(&mut remote, curriculum, &mut changes);
        {
            let mut state = self.lock();
            *state = remote;
            save_versioned(self.inner.storage.as_ref(), PROGRESS_KEY, PROGRESS_VERSION, &*state);
            info!("adopted remote progress (current level {})", state.current_level_id);
        }
        if !changes.is_empty() {
            debug!("remote progress needed repair ({} fields)", changes.fields.len());
            self.inner
                .reconciler
                .mark_dirty(changes.fields.iter().map(|field| field.as_str()));
            self.schedule_sync();
        }
    }

    /// Pushes local changes now. Never fails; see [`SyncOutcome`].
    pub async fn sync_now(&self, force_full: bool) -> SyncOutcome {
        let snapshot = self.snapshot_json();
        self.inner.reconciler.sync_now(&snapshot, force_full).await
    }

    // ── Internals ───────────────────────────────────────────────

    fn mutate(
        &self,
        op: impl FnOnce(&mut ProgressState, &Curriculum, &mut Changes) -> Step,
    ) -> MutationOutcome {
        match self.apply(op) {
            (Step::Applied, report) => MutationOutcome::Applied(report),
            (Step::Unchanged, _) => MutationOutcome::Unchanged,
            (Step::UnknownLevel, _) => MutationOutcome::UnknownLevel,
        }
    }

    /// Applies `op` under the state lock, then persists, marks dirty and
    /// arms a trailing sync if anything changed.
    fn apply<R>(
        &self,
        op: impl FnOnce(&mut ProgressState, &Curriculum, &mut Changes) -> R,
    ) -> (R, UnlockReport) {
        let curriculum = &self.inner.curriculum;
        let (result, changes) = {
            let mut state = self.lock();
            let mut changes = Changes::default();
            let result = op(&mut *state, curriculum, &mut changes);
            if !changes.is_empty() {
                award_earned(&mut state, curriculum, &mut changes);
                state.touch();
                changes.touch(ProgressField::LastUpdated);
                save_versioned(self.inner.storage.as_ref(), PROGRESS_KEY, PROGRESS_VERSION, &*state);
            }
            (result, changes)
        };

        if !changes.is_empty() {
            let reconciler = &self.inner.reconciler;
            reconciler.mark_dirty(changes.fields.iter().map(|field| field.as_str()));
            if changes.full {
                reconciler.mark_full();
            }
            self.schedule_sync();
            debug!("progress mutated ({} fields)", changes.fields.len());
        }
        (result, changes.report)
    }

    /// Arms a trailing sync that snapshots the state when it runs.
    fn schedule_sync(&self) {
        let state = Arc::clone(&self.inner.state);
        self.inner.reconciler.schedule_sync(move || {
            state_to_json(&state.lock().unwrap_or_else(PoisonError::into_inner))
        });
    }
}

fn state_to_json(state: &ProgressState) -> Value {
    serde_json::to_value(state).unwrap_or_else(|e| {
        error!("failed to serialize progress state: {e}");
        Value::Null
    })
}

fn award(state: &mut ProgressState, achievement: &Achievement, changes: &mut Changes) -> UnlockedAchievement {
    let record = UnlockedAchievement {
        id: achievement.id.clone(),
        title: achievement.title.clone(),
        description: achievement.description.clone(),
        icon: achievement.icon.clone(),
        unlocked_at: Utc::now(),
    };
    state.achievements.insert(record.id.clone(), record.clone());
    changes.touch(ProgressField::Achievements);
    changes.report.achievements.push(record.id.clone());
    info!("achievement unlocked: {}", record.id);
    record
}

/// Awards every catalog achievement whose rule now holds.
fn award_earned(state: &mut ProgressState, curriculum: &Curriculum, changes: &mut Changes) {
    let earned: Vec<Achievement> = curriculum
        .achievements()
        .newly_earned(state, curriculum)
        .cloned()
        .collect();
    for achievement in &earned {
        award(state, achievement, changes);
    }
}
