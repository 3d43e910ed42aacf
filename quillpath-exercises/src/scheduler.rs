//! Exercise generation scheduler.
//!
//! Keeps at least one exercise ready for the learner's current level and
//! backfills up to the per-level maximum in the background:
//! - Single-flight generation per level, shared by the foreground and
//!   background paths
//! - Background tasks registered per level and resumed once after a restart
//! - Bounded per-exercise retries; background failures are logged and skipped
//!
//! State lives behind a `std::sync::Mutex` that is never held across an
//! await. The cache and task registry are persisted after every change.

use crate::cache::ExerciseCache;
use crate::config::SchedulerConfig;
use crate::error::{ExerciseError, ExerciseResult, GeneratorError};
use crate::generator::ExerciseGenerator;
use crate::tasks::TaskRegistry;
use crate::types::{ExerciseRecord, FirstExercise, GenerationRequest, GenerationTask, LevelCacheState};

use chrono::Utc;
use quillpath_curriculum::Curriculum;
use quillpath_storage::{load_versioned, save_versioned, Storage};
use quillpath_types::{LevelId, ProgressState};
use std::collections::HashSet;
use uuid::Uuid;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Storage key of the exercise cache.
pub const CACHE_KEY: &str = "exercise-cache";
/// Storage key of the generation task registry.
pub const TASKS_KEY: &str = "generation-tasks";
const CACHE_VERSION: u32 = 1;
const TASKS_VERSION: u32 = 1;

/// Handle to the scheduler. Clones share the same cache and registry.
#[derive(Clone)]
pub struct ExerciseScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    curriculum: Arc<Curriculum>,
    generator: Arc<dyn ExerciseGenerator>,
    storage: Arc<dyn Storage>,
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
}

struct SchedulerState {
    cache: ExerciseCache,
    tasks: TaskRegistry,
    /// Levels with a generator call running, foreground or background.
    generating: HashSet<LevelId>,
    /// Tasks loaded from storage at startup, not yet resumed.
    interrupted: Vec<Uuid>,
}

/// Clears a level's in-flight mark however the generation ends.
struct FlightGuard<'a> {
    scheduler: &'a ExerciseScheduler,
    level_id: LevelId,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.scheduler.lock().generating.remove(&self.level_id);
    }
}

impl ExerciseScheduler {
    /// Loads the persisted cache and task registry, purging stale entries.
    pub fn new(
        curriculum: Arc<Curriculum>,
        generator: Arc<dyn ExerciseGenerator>,
        storage: Arc<dyn Storage>,
        config: SchedulerConfig,
    ) -> Self {
        let cache: ExerciseCache = load_versioned(storage.as_ref(), CACHE_KEY, CACHE_VERSION)
            .unwrap_or_else(ExerciseCache::new);
        let tasks: TaskRegistry = load_versioned(storage.as_ref(), TASKS_KEY, TASKS_VERSION)
            .unwrap_or_else(TaskRegistry::new);
        let interrupted: Vec<Uuid> = tasks.iter().map(|task| task.id).collect();
        if !interrupted.is_empty() {
            debug!("restored {} interrupted generation tasks", interrupted.len());
        }

        let scheduler = Self {
            inner: Arc::new(Inner {
                curriculum,
                generator,
                storage,
                config,
                state: Mutex::new(SchedulerState {
                    cache,
                    tasks,
                    generating: HashSet::new(),
                    interrupted,
                }),
            }),
        };
        scheduler.purge_stale();
        scheduler
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn save_cache(&self, state: &SchedulerState) {
        save_versioned(self.inner.storage.as_ref(), CACHE_KEY, CACHE_VERSION, &state.cache);
    }

    fn save_tasks(&self, state: &SchedulerState) {
        save_versioned(self.inner.storage.as_ref(), TASKS_KEY, TASKS_VERSION, &state.tasks);
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    // ── Reads ───────────────────────────────────────────────────

    pub fn has_exercises_for_level(&self, level_id: &str) -> bool {
        self.exercise_count(level_id) > 0
    }

    pub fn exercises_for_level(&self, level_id: &str) -> Vec<ExerciseRecord> {
        self.lock().cache.exercises(level_id).to_vec()
    }

    pub fn exercise_count(&self, level_id: &str) -> usize {
        self.lock().cache.count(level_id)
    }

    pub fn exercise_at(&self, level_id: &str, index: usize) -> Option<ExerciseRecord> {
        self.lock().cache.get(level_id, index).cloned()
    }

    pub fn cache_state(&self, level_id: &str) -> LevelCacheState {
        let state = self.lock();
        let count = state.cache.count(level_id);
        if count >= self.inner.config.max_per_level {
            LevelCacheState::Full
        } else if state.generating.contains(level_id) || state.tasks.has_active(level_id) {
            LevelCacheState::Generating
        } else if count > 0 {
            LevelCacheState::HasExercises
        } else {
            LevelCacheState::Empty
        }
    }

    pub fn active_task(&self, level_id: &str) -> Option<GenerationTask> {
        self.lock().tasks.get(level_id).cloned()
    }

    pub fn active_task_count(&self) -> usize {
        self.lock().tasks.len()
    }

    // ── Foreground ──────────────────────────────────────────────

    /// Generates the first exercise of a level if it has none.
    ///
    /// Concurrent calls for the same level make a single generator call;
    /// the others return [`FirstExercise::InFlight`].
    pub async fn preload_first_exercise_if_needed(
        &self,
        level_id: &str,
    ) -> ExerciseResult<FirstExercise> {
        if !self.inner.curriculum.contains(level_id) {
            return Err(ExerciseError::UnknownLevel(level_id.to_string()));
        }
        let level_id = LevelId::new(level_id);

        let _guard = {
            let mut state = self.lock();
            if state.cache.count(level_id.as_str()) > 0 {
                return Ok(FirstExercise::AlreadyCached);
            }
            if state.generating.contains(&level_id) || state.tasks.has_active(level_id.as_str()) {
                return Ok(FirstExercise::InFlight);
            }
            state.generating.insert(level_id.clone());
            FlightGuard {
                scheduler: self,
                level_id: level_id.clone(),
            }
        };

        let Some(request) = self.next_request(&level_id) else {
            return Err(ExerciseError::UnknownLevel(level_id.to_string()));
        };
        let record = self
            .generate_with_retry(&request)
            .await
            .map_err(|e| ExerciseError::GenerationFailed {
                level: level_id.clone(),
                reason: e.to_string(),
            })?;

        self.insert(&level_id, record.clone());
        info!("generated first exercise for {level_id} ({})", record.kind);
        Ok(FirstExercise::Generated(record))
    }

    // ── Background ──────────────────────────────────────────────

    /// Starts filling a level up to `count` exercises (capped at the
    /// per-level maximum) in the background.
    ///
    /// Returns false if the level already has an active task, is already
    /// filled, is unknown, or no async runtime is available.
    pub fn preload_remaining_exercises(&self, level_id: &str, count: usize) -> bool {
        if !self.inner.curriculum.contains(level_id) {
            warn!("not preloading unknown level {level_id}");
            return false;
        }
        let Ok(runtime) = Handle::try_current() else {
            debug!("no async runtime, skipping preload for {level_id}");
            return false;
        };

        let goal = count.min(self.inner.config.max_per_level);
        let task = {
            let mut state = self.lock();
            if state.cache.count(level_id) >= goal {
                return false;
            }
            let task = GenerationTask::new(LevelId::new(level_id), count);
            if !state.tasks.register(task.clone()) {
                debug!("generation task already active for {level_id}");
                return false;
            }
            self.save_tasks(&state);
            task
        };

        debug!("starting generation task {} for {level_id} (target {count})", task.id);
        runtime.spawn(self.clone().run_task(task));
        true
    }

    /// Resumes tasks interrupted by a restart, each at most once.
    ///
    /// Only tasks loaded from storage when the scheduler was built are
    /// considered; tasks started by this process are already running.
    /// Returns the number of tasks scheduled to resume.
    pub fn resume_interrupted_tasks(&self) -> usize {
        let Ok(runtime) = Handle::try_current() else {
            debug!("no async runtime, not resuming generation tasks");
            return 0;
        };

        let (resumed, abandoned) = {
            let mut state = self.lock();
            let interrupted = std::mem::take(&mut state.interrupted);
            let claimed = state.tasks.claim_for_resume(&interrupted);
            self.save_tasks(&state);
            claimed
        };
        for task in &abandoned {
            warn!("dropping generation task for {} interrupted after resume", task.level_id);
        }

        let delay = self.inner.config.resume_delay();
        for task in &resumed {
            info!("resuming generation task for {} in {delay:?}", task.level_id);
            let scheduler = self.clone();
            let task = task.clone();
            runtime.spawn(async move {
                tokio::time::sleep(delay).await;
                scheduler.run_task(task).await;
            });
        }
        resumed.len()
    }

    /// Unregisters a level's task. Its loop stops before the next request.
    pub fn cancel_generation(&self, level_id: &str) -> bool {
        let mut state = self.lock();
        let removed = state.tasks.remove(level_id).is_some();
        if removed {
            self.save_tasks(&state);
            debug!("cancelled generation task for {level_id}");
        }
        removed
    }

    async fn run_task(self, task: GenerationTask) {
        let level_id = task.level_id.clone();
        let goal = task.target_count.min(self.inner.config.max_per_level);
        let rounds = goal.saturating_sub(self.exercise_count(level_id.as_str()));
        let mut generated = 0;

        for round in 0..rounds {
            if round > 0 {
                tokio::time::sleep(self.inner.config.request_delay()).await;
            }
            let Some(_flight) = self.claim_flight_for(&task).await else {
                debug!("generation task for {level_id} was cancelled");
                return;
            };
            if self.exercise_count(level_id.as_str()) >= goal {
                break;
            }
            let Some(request) = self.next_request(&level_id) else {
                break;
            };
            match self.generate_with_retry(&request).await {
                Ok(record) => {
                    if !self.insert(&level_id, record) {
                        break;
                    }
                    generated += 1;
                }
                Err(e) => {
                    warn!("skipping exercise {} of {level_id} after retries: {e}", round + 1);
                }
            }
        }

        let mut state = self.lock();
        if state.tasks.finish(level_id.as_str(), task.id) {
            self.save_tasks(&state);
        }
        info!(
            "generation task for {level_id} finished ({generated} new, {} cached)",
            state.cache.count(level_id.as_str())
        );
    }

    /// Waits until no other generation runs for the task's level, then
    /// marks it in flight. `None` once the task is no longer registered.
    async fn claim_flight_for(&self, task: &GenerationTask) -> Option<FlightGuard<'_>> {
        loop {
            {
                let mut state = self.lock();
                if !state.tasks.is_current(task) {
                    return None;
                }
                if state.generating.insert(task.level_id.clone()) {
                    return Some(FlightGuard {
                        scheduler: self,
                        level_id: task.level_id.clone(),
                    });
                }
            }
            tokio::time::sleep(self.inner.config.wait_poll()).await;
        }
    }

    // ── Orchestration ───────────────────────────────────────────

    /// Prefetches in priority order: the current level's first exercise
    /// (awaited), then the next unlocked level's first exercise, then a
    /// background backfill of the current level.
    ///
    /// Returns the current level's result; a failure there is the only one
    /// the learner needs to see.
    pub async fn preload_prioritized_lessons(
        &self,
        progress: &ProgressState,
    ) -> ExerciseResult<FirstExercise> {
        let current = progress.current_level_id.clone();
        let first = self.preload_first_exercise_if_needed(current.as_str()).await;
        if let Err(e) = &first {
            warn!("current level {current} has no exercise: {e}");
        }

        if let Some(next) = self.next_unlocked_level(progress) {
            if let Err(e) = self.preload_first_exercise_if_needed(next.as_str()).await {
                warn!("could not prefetch next level {next}: {e}");
            }
        }

        self.preload_remaining_exercises(current.as_str(), self.inner.config.max_per_level);
        first
    }

    /// The level the learner is likely to open after the current one.
    fn next_unlocked_level(&self, progress: &ProgressState) -> Option<LevelId> {
        let curriculum = &self.inner.curriculum;
        let current = progress.current_level_id.as_str();
        if let Some(next) = curriculum.next_level(current) {
            if progress.is_unlocked(next.id.as_str()) {
                return Some(next.id.clone());
            }
        }
        curriculum
            .levels()
            .iter()
            .find(|level| {
                level.id.as_str() != current
                    && progress.is_unlocked(level.id.as_str())
                    && !progress.is_completed(level.id.as_str())
            })
            .map(|level| level.id.clone())
    }

    /// Waits until the exercise at `index` exists, bounded by `max_wait`.
    pub async fn wait_for_exercise(
        &self,
        level_id: &str,
        index: usize,
    ) -> ExerciseResult<ExerciseRecord> {
        let started = Instant::now();
        let max_wait = self.inner.config.max_wait();
        loop {
            if let Some(record) = self.exercise_at(level_id, index) {
                return Ok(record);
            }
            let waited = started.elapsed();
            if waited >= max_wait {
                return Err(ExerciseError::WaitTimedOut {
                    level: LevelId::new(level_id),
                    index,
                    waited,
                });
            }
            let pause = self.inner.config.wait_poll().min(max_wait - waited);
            tokio::time::sleep(pause).await;
        }
    }

    // ── Maintenance ─────────────────────────────────────────────

    /// Drops cache entries older than the retention window.
    pub fn purge_stale(&self) -> usize {
        let mut state = self.lock();
        let purged = state
            .cache
            .purge_older_than(self.inner.config.retention(), Utc::now());
        if purged > 0 {
            self.save_cache(&state);
            info!("purged {purged} stale exercise cache entries");
        }
        purged
    }

    /// Drops a level's exercises. Returns how many were removed.
    pub fn clear_level(&self, level_id: &str) -> usize {
        let mut state = self.lock();
        let removed = state.cache.clear_level(level_id);
        self.save_cache(&state);
        removed
    }

    pub fn clear_all(&self) {
        let mut state = self.lock();
        state.cache.clear();
        self.save_cache(&state);
        debug!("cleared exercise cache");
    }

    // ── Internals ───────────────────────────────────────────────

    /// Builds the request for the level's next exercise, advancing the
    /// kind rotation.
    fn next_request(&self, level_id: &LevelId) -> Option<GenerationRequest> {
        let level = self.inner.curriculum.level(level_id.as_str())?;
        let kind = self.lock().cache.next_kind(level_id);
        Some(GenerationRequest {
            level_id: level_id.clone(),
            category: level.category,
            topic: level.topic.clone(),
            kind,
            difficulty: level.difficulty,
        })
    }

    /// Stores a record unless the level is full.
    fn insert(&self, level_id: &LevelId, record: ExerciseRecord) -> bool {
        let mut state = self.lock();
        let stored = state
            .cache
            .push(level_id, record, self.inner.config.max_per_level);
        if stored {
            self.save_cache(&state);
        } else {
            debug!("{level_id} is full, discarding generated exercise");
        }
        stored
    }

    async fn generate_with_retry(
        &self,
        request: &GenerationRequest,
    ) -> Result<ExerciseRecord, GeneratorError> {
        let max_retries = self.inner.config.max_retries;
        let mut attempt = 0;
        loop {
            match self.inner.generator.generate(request).await {
                Ok(record) => return Ok(record),
                Err(e) if e.is_transient() && attempt < max_retries => {
                    let delay = self.inner.config.retry_delay();
                    warn!(
                        "generation for {} failed ({e}), retry {} in {delay:?}",
                        request.level_id,
                        attempt + 1
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
