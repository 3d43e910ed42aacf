use async_trait::async_trait;
use pretty_assertions::assert_eq;
use quillpath_app::{
    init_tracing, AppConfig, AppError, Collaborators, Reconciliation, ServiceContext,
};
use quillpath_curriculum::Level;
use quillpath_exercises::{
    ExerciseGenerator, ExerciseRecord, FirstExercise, GenerationRequest, GenerationTask,
    GeneratorError, TaskRegistry, TASKS_KEY,
};
use quillpath_storage::{save_versioned, MemoryStorage, Storage};
use quillpath_sync::{ConnectivityFlag, RemoteStore, SyncMode, SyncOutcome, SyncResult};
use quillpath_types::{Category, LevelId, ProgressState};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Fakes ───────────────────────────────────────────────────────

/// Remote store holding a single JSON document.
#[derive(Default)]
struct DocumentRemote {
    document: Mutex<Option<Value>>,
    pushes: AtomicUsize,
    /// Delay inside every save before it lands.
    latency: Duration,
}

impl DocumentRemote {
    fn slow(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn with_document(document: Value) -> Self {
        Self {
            document: Mutex::new(Some(document)),
            ..Self::default()
        }
    }

    fn document(&self) -> Option<Value> {
        self.document.lock().unwrap().clone()
    }

    fn pushes(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for DocumentRemote {
    async fn save(&self, _learner_id: &str, document: &Value) -> SyncResult<()> {
        self.delay().await;
        self.pushes.fetch_add(1, Ordering::SeqCst);
        *self.document.lock().unwrap() = Some(document.clone());
        Ok(())
    }

    async fn save_partial(&self, _learner_id: &str, fields: &Map<String, Value>) -> SyncResult<()> {
        self.delay().await;
        self.pushes.fetch_add(1, Ordering::SeqCst);
        let mut document = self.document.lock().unwrap();
        let target = document.get_or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(object) = target {
            for (key, value) in fields {
                object.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn load(&self, _learner_id: &str) -> SyncResult<Option<Value>> {
        Ok(self.document())
    }
}

#[derive(Default)]
struct CountingGenerator {
    calls: AtomicUsize,
    levels: Mutex<Vec<LevelId>>,
}

#[async_trait]
impl ExerciseGenerator for CountingGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<ExerciseRecord, GeneratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.levels.lock().unwrap().push(request.level_id.clone());
        Ok(ExerciseRecord::new(request, "Write about it."))
    }
}

struct Setup {
    remote: Arc<DocumentRemote>,
    generator: Arc<CountingGenerator>,
    storage: MemoryStorage,
    online: bool,
}

impl Setup {
    fn new() -> Self {
        Self {
            remote: Arc::new(DocumentRemote::default()),
            generator: Arc::new(CountingGenerator::default()),
            storage: MemoryStorage::new(),
            online: true,
        }
    }

    fn offline(mut self) -> Self {
        self.online = false;
        self
    }

    fn collaborators(&self) -> Collaborators {
        let storage: Arc<dyn Storage> = Arc::new(self.storage.clone());
        Collaborators {
            progress_remote: self.remote.clone(),
            connectivity: Arc::new(ConnectivityFlag::new(self.online)),
            generator: self.generator.clone(),
            storage: Some(storage),
        }
    }

    async fn start(&self) -> anyhow::Result<ServiceContext> {
        Ok(ServiceContext::bootstrap(AppConfig::default(), self.collaborators()).await?)
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

// ── Startup ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn fresh_start_with_empty_remote() -> anyhow::Result<()> {
    let setup = Setup::new();
    let ctx = setup.start().await?;
    let startup = ctx.startup();
    assert!(!startup.restored_local);
    assert_eq!(startup.reconciliation, Reconciliation::UpToDate);
    assert_eq!(startup.resumed_tasks, 0);
    assert_eq!(ctx.ledger().current_level().as_str(), "mechanics-1");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn fresh_install_adopts_remote_progress() -> anyhow::Result<()> {
    let mut remote_state = ProgressState::initial(LevelId::new("mechanics-1"));
    remote_state.current_level_id = LevelId::new("mechanics-2");
    remote_state.completed_levels.insert(LevelId::new("mechanics-1"));
    remote_state.level_progress.insert(LevelId::new("mechanics-1"), 100);
    remote_state.total_score = 300;

    let mut setup = Setup::new();
    setup.remote = Arc::new(DocumentRemote::with_document(serde_json::to_value(&remote_state)?));
    let ctx = setup.start().await?;

    assert_eq!(ctx.startup().reconciliation, Reconciliation::AdoptedRemote);
    let state = ctx.ledger().snapshot();
    assert_eq!(state.current_level_id.as_str(), "mechanics-2");
    assert!(state.is_unlocked("mechanics-2"));
    assert_eq!(state.total_score, 300);

    // The remote copy was missing its current level from the unlocked set;
    // the repaired field goes back out with the trailing sync.
    assert!(ctx.ledger().is_dirty());
    assert_eq!(setup.remote.pushes(), 0);
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!ctx.ledger().is_dirty());
    assert_eq!(setup.remote.pushes(), 1);
    assert_eq!(
        setup.remote.document().unwrap()["unlocked_levels"],
        serde_json::json!(["mechanics-1", "mechanics-2"])
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn dirty_local_state_is_pushed_in_full() -> anyhow::Result<()> {
    let setup = Setup::new().offline();
    {
        let ctx = setup.start().await?;
        assert_eq!(ctx.startup().reconciliation, Reconciliation::Offline);
        ctx.record_progress("mechanics-1", 40);
        assert!(ctx.ledger().is_dirty());
    }

    let mut online = Setup::new();
    online.storage = setup.storage.clone();
    online.remote = setup.remote.clone();
    let ctx = online.start().await?;

    assert!(ctx.startup().restored_local);
    assert!(matches!(
        ctx.startup().reconciliation,
        Reconciliation::PushedLocal(SyncOutcome::Pushed { mode: SyncMode::Full, .. })
    ));
    assert!(!ctx.ledger().is_dirty());
    let pushed = setup.remote.document().unwrap();
    assert_eq!(pushed["level_progress"]["mechanics-1"], Value::from(40));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn clean_local_state_matching_remote_is_kept() -> anyhow::Result<()> {
    let setup = Setup::new();
    {
        let ctx = setup.start().await?;
        ctx.record_progress("mechanics-1", 100);
        assert!(ctx.shutdown().await.is_pushed());
    }

    let ctx = setup.start().await?;
    assert_eq!(ctx.startup().reconciliation, Reconciliation::UpToDate);
    assert_eq!(ctx.ledger().current_level().as_str(), "mechanics-2");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn interrupted_backfill_resumes_on_start() -> anyhow::Result<()> {
    let setup = Setup::new();
    // Registry left behind by a process that died mid-backfill.
    let mut registry = TaskRegistry::new();
    registry.register(GenerationTask::new(LevelId::new("mechanics-1"), 5));
    save_versioned(&setup.storage, TASKS_KEY, 1, &registry);

    let ctx = setup.start().await?;
    assert_eq!(ctx.startup().resumed_tasks, 1);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(ctx.scheduler().exercise_count("mechanics-1"), 5);
    assert_eq!(ctx.scheduler().active_task_count(), 0);
    Ok(())
}

#[tokio::test]
async fn invalid_curriculum_fails_bootstrap() {
    let mut config = AppConfig::default();
    config
        .curriculum
        .levels
        .push(Level::new("loop-a", Category::Voice, 4, 9).requires("loop-b"));
    config
        .curriculum
        .levels
        .push(Level::new("loop-b", Category::Voice, 4, 10).requires("loop-a"));

    let setup = Setup::new();
    let result = ServiceContext::bootstrap(config, setup.collaborators()).await;
    assert!(matches!(result, Err(AppError::Curriculum(_))));
}

#[tokio::test]
async fn file_storage_from_data_dir() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = AppConfig {
        data_dir: Some(dir.path().to_path_buf()),
        ..AppConfig::default()
    };
    let setup = Setup::new().offline();
    let collaborators = || Collaborators {
        storage: None,
        ..setup.collaborators()
    };

    {
        let ctx = ServiceContext::bootstrap(config.clone(), collaborators()).await?;
        ctx.complete_level("mechanics-1");
    }
    let ctx = ServiceContext::bootstrap(config, collaborators()).await?;
    assert!(ctx.startup().restored_local);
    assert_eq!(ctx.ledger().current_level().as_str(), "mechanics-2");
    assert!(dir.path().join("progress-state.json").exists());
    Ok(())
}

// ── Completion → prefetch ───────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn completing_current_level_prefetches_next() -> anyhow::Result<()> {
    let setup = Setup::new();
    let ctx = setup.start().await?;

    let outcome = ctx.record_progress("mechanics-1", 100);
    assert_eq!(
        outcome.report().unwrap().advanced_to,
        Some(LevelId::new("mechanics-2"))
    );
    settle().await;
    assert_eq!(ctx.scheduler().exercise_count("mechanics-2"), 1);
    assert_eq!(
        *setup.generator.levels.lock().unwrap(),
        vec![LevelId::new("mechanics-2")]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn partial_progress_does_not_prefetch() -> anyhow::Result<()> {
    let setup = Setup::new();
    let ctx = setup.start().await?;
    ctx.record_progress("mechanics-1", 50);
    ctx.complete_level("mechanics-3");
    settle().await;
    assert_eq!(setup.generator.calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn prepare_lessons_fills_current_level() -> anyhow::Result<()> {
    let setup = Setup::new();
    let ctx = setup.start().await?;
    let first = ctx.prepare_lessons().await?;
    assert!(matches!(first, FirstExercise::Generated(_)));
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(ctx.scheduler().exercise_count("mechanics-1"), 5);
    Ok(())
}

// ── Shutdown ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn shutdown_pushes_pending_changes() -> anyhow::Result<()> {
    let setup = Setup::new();
    let ctx = setup.start().await?;
    ctx.ledger().add_score(25);
    assert!(ctx.ledger().reconciler().has_scheduled_sync());

    let outcome = ctx.shutdown().await;
    assert!(outcome.is_pushed());
    assert!(!ctx.ledger().reconciler().has_scheduled_sync());
    assert!(!ctx.ledger().is_dirty());
    assert_eq!(setup.remote.document().unwrap()["total_score"], Value::from(25));

    assert_eq!(ctx.shutdown().await, SyncOutcome::Clean);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_running_trailing_push() -> anyhow::Result<()> {
    let mut setup = Setup::new();
    setup.remote = Arc::new(DocumentRemote::slow(Duration::from_secs(1)));
    let ctx = setup.start().await?;
    ctx.ledger().add_score(25);

    // The trailing sync is past its delay and waiting on the remote.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    ctx.ledger().add_score(5);

    let outcome = ctx.shutdown().await;
    assert!(outcome.is_pushed());
    assert_eq!(setup.remote.pushes(), 2);
    assert!(!ctx.ledger().is_dirty());
    assert_eq!(setup.remote.document().unwrap()["total_score"], Value::from(30));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn shutdown_offline_keeps_changes_queued() -> anyhow::Result<()> {
    let setup = Setup::new().offline();
    let ctx = setup.start().await?;
    ctx.ledger().add_score(25);
    assert_eq!(ctx.shutdown().await, SyncOutcome::Offline);
    assert!(ctx.ledger().is_dirty());
    Ok(())
}

// ── Config & tracing ────────────────────────────────────────────

#[test]
fn config_from_partial_json() -> anyhow::Result<()> {
    let config = AppConfig::from_json_str(
        r#"{"learner_id": "ada", "sync": {"min_interval_secs": 30}, "scheduler": {"max_per_level": 3}}"#,
    )?;
    assert_eq!(config.learner_id, "ada");
    assert_eq!(config.sync.min_interval_secs, 30);
    assert_eq!(config.sync.debounce_delay_ms, 2000);
    assert_eq!(config.scheduler.max_per_level, 3);
    assert!(config.data_dir.is_none());
    assert_eq!(config.curriculum.levels.len(), 9);
    Ok(())
}

#[test]
fn config_rejects_bad_input() {
    assert!(matches!(
        AppConfig::from_json_str("{not json"),
        Err(AppError::Config(_))
    ));
    assert!(matches!(
        AppConfig::from_json_str(r#"{"learner_id": " "}"#),
        Err(AppError::InvalidConfig(_))
    ));
    assert!(matches!(
        AppConfig::from_json_str(r#"{"scheduler": {"max_per_level": 0}}"#),
        Err(AppError::InvalidConfig(_))
    ));
}

#[test]
fn tracing_installs_once() {
    init_tracing();
    assert!(!init_tracing());
}
