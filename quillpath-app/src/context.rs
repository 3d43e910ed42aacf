//! Service context.
//!
//! Builds every core service exactly once from an [`AppConfig`] and the
//! platform's collaborators, then runs the startup sequence:
//! 1. Load the persisted stores (progress, sync envelope, exercise cache,
//!    task registry). Stale cache entries are purged while loading.
//! 2. Reconcile progress with the remote store once.
//! 3. Resume generation tasks interrupted by the last shutdown.

use crate::config::AppConfig;
use crate::error::AppResult;

use quillpath_curriculum::Curriculum;
use quillpath_exercises::{ExerciseGenerator, ExerciseResult, ExerciseScheduler, FirstExercise};
use quillpath_progress::{MutationOutcome, ProgressLedger};
use quillpath_storage::{FileStorage, MemoryStorage, Storage};
use quillpath_sync::{Connectivity, RemoteStore, SyncOutcome, SyncReconciler};
use quillpath_types::{LevelId, ProgressState};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Document name of the learner progress store.
pub const PROGRESS_DOCUMENT: &str = "progress";

/// Platform-provided implementations of the external interfaces.
pub struct Collaborators {
    pub progress_remote: Arc<dyn RemoteStore>,
    pub connectivity: Arc<dyn Connectivity>,
    pub generator: Arc<dyn ExerciseGenerator>,
    /// Overrides the storage derived from `AppConfig::data_dir`.
    pub storage: Option<Arc<dyn Storage>>,
}

/// What the startup reconciliation pass did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// The remote copy replaced local state.
    AdoptedRemote,
    /// Local changes were pushed.
    PushedLocal(SyncOutcome),
    /// Nothing to exchange.
    UpToDate,
    /// Offline; local state is used as is.
    Offline,
}

/// Summary of the startup sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartupReport {
    pub restored_local: bool,
    pub reconciliation: Reconciliation,
    pub resumed_tasks: usize,
}

/// Owns the core services for one learner session.
pub struct ServiceContext {
    config: AppConfig,
    curriculum: Arc<Curriculum>,
    storage: Arc<dyn Storage>,
    ledger: ProgressLedger,
    scheduler: ExerciseScheduler,
    startup: StartupReport,
}

impl ServiceContext {
    /// Constructs the services and runs the startup sequence.
    pub async fn bootstrap(config: AppConfig, collaborators: Collaborators) -> AppResult<Self> {
        config.validate()?;
        let curriculum = Arc::new(Curriculum::new(config.curriculum.clone())?);
        let storage = match collaborators.storage {
            Some(storage) => storage,
            None => open_storage(&config)?,
        };

        let reconciler = SyncReconciler::new(
            PROGRESS_DOCUMENT,
            config.learner_id.clone(),
            collaborators.progress_remote,
            collaborators.connectivity,
            storage.clone(),
            config.sync.clone(),
        );
        let ledger = ProgressLedger::load(curriculum.clone(), storage.clone(), reconciler);
        let scheduler = ExerciseScheduler::new(
            curriculum.clone(),
            collaborators.generator,
            storage.clone(),
            config.scheduler.clone(),
        );

        let reconciliation = reconcile(&ledger).await;
        let resumed_tasks = scheduler.resume_interrupted_tasks();
        let startup = StartupReport {
            restored_local: ledger.restored_from_storage(),
            reconciliation,
            resumed_tasks,
        };
        info!(
            "core started for {} on {} ({:?})",
            config.learner_id,
            ledger.current_level(),
            startup.reconciliation
        );

        Ok(Self {
            config,
            curriculum,
            storage,
            ledger,
            scheduler,
            startup,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn curriculum(&self) -> &Arc<Curriculum> {
        &self.curriculum
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    pub fn scheduler(&self) -> &ExerciseScheduler {
        &self.scheduler
    }

    pub fn startup(&self) -> &StartupReport {
        &self.startup
    }

    /// Records progress on a level and, if that moved the learner on,
    /// prefetches the first exercise of the new level.
    pub fn record_progress(&self, level_id: &str, value: u8) -> MutationOutcome {
        let outcome = self.ledger.update_category_progress(level_id, value);
        self.prefetch_after(&outcome);
        outcome
    }

    /// Completes a level, prefetching like [`record_progress`](Self::record_progress).
    pub fn complete_level(&self, level_id: &str) -> MutationOutcome {
        let outcome = self.ledger.complete_level(level_id);
        self.prefetch_after(&outcome);
        outcome
    }

    /// Makes sure the learner's current and next levels have content.
    pub async fn prepare_lessons(&self) -> ExerciseResult<FirstExercise> {
        let progress: ProgressState = self.ledger.snapshot();
        self.scheduler.preload_prioritized_lessons(&progress).await
    }

    /// Drops a trailing sync still in its delay and pushes local changes now.
    pub async fn shutdown(&self) -> SyncOutcome {
        let reconciler = self.ledger.reconciler();
        reconciler.cancel_scheduled();
        if !reconciler.is_online() {
            warn!("shutting down offline, local changes stay queued");
            return SyncOutcome::Offline;
        }
        if !reconciler.is_dirty() {
            return SyncOutcome::Clean;
        }
        // A trailing sync already past its delay keeps running; wait it out.
        let pause = reconciler.config().backoff_for(0);
        loop {
            let outcome = self.ledger.sync_now(true).await;
            if outcome != SyncOutcome::InFlight {
                debug!("final push: {outcome:?}");
                return outcome;
            }
            tokio::time::sleep(pause).await;
            if !reconciler.is_dirty() {
                return SyncOutcome::Clean;
            }
        }
    }

    fn prefetch_after(&self, outcome: &MutationOutcome) {
        let Some(report) = outcome.report() else {
            return;
        };
        if report.completed.is_empty() {
            return;
        }
        if let Some(level) = &report.advanced_to {
            self.prefetch_first(level.clone());
        }
    }

    fn prefetch_first(&self, level: LevelId) {
        let Ok(runtime) = Handle::try_current() else {
            debug!("no async runtime, not prefetching {level}");
            return;
        };
        let scheduler = self.scheduler.clone();
        runtime.spawn(async move {
            match scheduler.preload_first_exercise_if_needed(level.as_str()).await {
                Ok(first) => debug!("prefetch for {level}: {first:?}"),
                Err(e) => warn!("prefetch for {level} failed: {e}"),
            }
        });
    }
}

fn open_storage(config: &AppConfig) -> AppResult<Arc<dyn Storage>> {
    Ok(match &config.data_dir {
        Some(dir) => Arc::new(FileStorage::open(dir)?),
        None => Arc::new(MemoryStorage::new()),
    })
}

/// Single startup pass: adopt the remote copy when local state is clean and
/// older (or came from defaults), otherwise push local changes in full.
async fn reconcile(ledger: &ProgressLedger) -> Reconciliation {
    let reconciler = ledger.reconciler();
    if !reconciler.is_online() {
        return Reconciliation::Offline;
    }

    let remote = reconciler
        .pull()
        .await
        .and_then(|document| match serde_json::from_value::<ProgressState>(document) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("ignoring unreadable remote progress: {e}");
                None
            }
        });

    if !ledger.is_dirty() {
        if let Some(remote) = remote {
            let local_updated = ledger.snapshot().last_updated;
            if !ledger.restored_from_storage() || remote.last_updated > local_updated {
                ledger.restore_from_remote(remote);
                return Reconciliation::AdoptedRemote;
            }
        }
        return Reconciliation::UpToDate;
    }
    Reconciliation::PushedLocal(ledger.sync_now(true).await)
}
