//! Sync reconciler.
//!
//! Owns the dirty state of one document and pushes it to the remote store:
//! - Connectivity gate (offline → nothing sent, state stays dirty)
//! - Minimum interval between successful pushes unless forced
//! - Delta push of changed fields, or a full push when required
//! - Retry with exponential backoff for transient failures
//!
//! Follows the same shape as the outbox flush: capture pending work under
//! the lock, release it for the network call, then acknowledge.

use crate::config::SyncConfig;
use crate::connectivity::Connectivity;
use crate::debounce::Debouncer;
use crate::dirty::{DirtyTracker, PendingPush};
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteStore;
use crate::types::{SyncEnvelope, SyncMode, SyncOutcome};

use chrono::{DateTime, Utc};
use quillpath_storage::{load_versioned, save_versioned, Storage};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

const ENVELOPE_VERSION: u32 = 1;

/// Handle to a document's sync state. Clones share the same state.
#[derive(Clone)]
pub struct SyncReconciler {
    inner: Arc<Inner>,
}

struct Inner {
    document: String,
    learner_id: String,
    remote: Arc<dyn RemoteStore>,
    connectivity: Arc<dyn Connectivity>,
    storage: Arc<dyn Storage>,
    config: SyncConfig,
    debouncer: Debouncer,
    state: Mutex<ReconcilerState>,
}

struct ReconcilerState {
    tracker: DirtyTracker,
    last_sync: Option<DateTime<Utc>>,
    /// Monotonic time of the last acknowledged push, for the interval gate.
    last_success_at: Option<Instant>,
    in_flight: bool,
}

/// Clears the in-flight flag however the push ends.
struct InFlightGuard<'a> {
    state: &'a Mutex<ReconcilerState>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight = false;
    }
}

enum Payload {
    Full(Value),
    Delta(Map<String, Value>),
}

impl SyncReconciler {
    /// Creates a reconciler for `document`, restoring its persisted envelope.
    pub fn new(
        document: impl Into<String>,
        learner_id: impl Into<String>,
        remote: Arc<dyn RemoteStore>,
        connectivity: Arc<dyn Connectivity>,
        storage: Arc<dyn Storage>,
        config: SyncConfig,
    ) -> Self {
        let document = document.into();
        let envelope: SyncEnvelope =
            load_versioned(storage.as_ref(), &envelope_key(&document), ENVELOPE_VERSION)
                .unwrap_or_else(SyncEnvelope::default);
        if envelope.dirty {
            debug!(
                "restored dirty sync envelope for {document} ({} fields)",
                envelope.changed_fields.len()
            );
        }

        let debouncer = Debouncer::new(config.debounce_delay());
        Self {
            inner: Arc::new(Inner {
                document,
                learner_id: learner_id.into(),
                remote,
                connectivity,
                storage,
                config,
                debouncer,
                state: Mutex::new(ReconcilerState {
                    tracker: DirtyTracker::from_envelope(&envelope),
                    last_sync: envelope.last_sync_timestamp,
                    last_success_at: None,
                    in_flight: false,
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ReconcilerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, state: &ReconcilerState) {
        save_versioned(
            self.inner.storage.as_ref(),
            &envelope_key(&self.inner.document),
            ENVELOPE_VERSION,
            &state.tracker.to_envelope(state.last_sync),
        );
    }

    pub fn document(&self) -> &str {
        &self.inner.document
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Records changed top-level fields. Accumulates until a push succeeds.
    pub fn mark_dirty<I, S>(&self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.lock();
        state.tracker.mark(fields);
        self.persist(&state);
    }

    /// Requires the next push to carry the whole document.
    pub fn mark_full(&self) {
        let mut state = self.lock();
        state.tracker.mark_full();
        self.persist(&state);
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().tracker.is_dirty()
    }

    pub fn is_online(&self) -> bool {
        self.inner.connectivity.is_online()
    }

    pub fn last_sync_timestamp(&self) -> Option<DateTime<Utc>> {
        self.lock().last_sync
    }

    pub fn envelope(&self) -> SyncEnvelope {
        let state = self.lock();
        state.tracker.to_envelope(state.last_sync)
    }

    /// Pushes local changes to the remote store.
    ///
    /// `snapshot` is the current document. Without `force_full`, a push is
    /// skipped inside the minimum interval and carries only dirty fields
    /// unless a full push is pending or the document was never synced.
    pub async fn sync_now(&self, snapshot: &Value, force_full: bool) -> SyncOutcome {
        if snapshot.is_null() {
            return SyncOutcome::Failed {
                error: "empty snapshot".to_string(),
            };
        }
        if !self.is_online() {
            debug!("offline, deferring {} sync", self.inner.document);
            return SyncOutcome::Offline;
        }

        let push = {
            let mut state = self.lock();
            if state.in_flight {
                return SyncOutcome::InFlight;
            }
            if !force_full && !state.tracker.is_dirty() {
                return SyncOutcome::Clean;
            }
            if !force_full {
                if let Some(at) = state.last_success_at {
                    let elapsed = at.elapsed();
                    let min_interval = self.inner.config.min_interval();
                    if elapsed < min_interval {
                        return SyncOutcome::Debounced {
                            retry_in: min_interval - elapsed,
                        };
                    }
                }
            }
            state.in_flight = true;
            let never_synced = state.last_sync.is_none();
            state.tracker.checkpoint(force_full || never_synced)
        };
        let _guard = InFlightGuard {
            state: &self.inner.state,
        };

        let (payload, mode) = build_payload(snapshot, &push);
        let field_count = match &payload {
            Payload::Full(Value::Object(map)) => map.len(),
            Payload::Full(_) => 1,
            Payload::Delta(map) => map.len(),
        };

        match self.push_with_retry(&payload).await {
            Ok(()) => {
                let mut state = self.lock();
                state.tracker.acknowledge(&push);
                state.last_sync = Some(Utc::now());
                state.last_success_at = Some(Instant::now());
                self.persist(&state);
                info!(
                    "pushed {} ({:?}, {field_count} fields)",
                    self.inner.document, mode
                );
                SyncOutcome::Pushed {
                    mode,
                    fields: field_count,
                }
            }
            Err(e) => {
                warn!("{} sync failed, will retry later: {e}", self.inner.document);
                SyncOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn push_with_retry(&self, payload: &Payload) -> SyncResult<()> {
        let max_retries = self.inner.config.max_retries;
        let mut attempt = 0;
        loop {
            let result = match payload {
                Payload::Full(document) => {
                    self.inner
                        .remote
                        .save(&self.inner.learner_id, document)
                        .await
                }
                Payload::Delta(fields) => {
                    self.inner
                        .remote
                        .save_partial(&self.inner.learner_id, fields)
                        .await
                }
            };
            match result {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < max_retries => {
                    let backoff = self.inner.config.backoff_for(attempt);
                    warn!("{} push failed ({e}), retrying in {backoff:?}", self.inner.document);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Arms a trailing sync after the debounce delay.
    ///
    /// `snapshot` is called when the sync actually runs so it sees every
    /// edit made in between. Rescheduling replaces the pending sync.
    pub fn schedule_sync<F>(&self, snapshot: F) -> bool
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        let reconciler = self.clone();
        let pause = self.inner.config.debounce_delay();
        self.inner.debouncer.schedule(async move {
            loop {
                match reconciler.sync_now(&snapshot(), false).await {
                    SyncOutcome::Debounced { retry_in } => tokio::time::sleep(retry_in).await,
                    SyncOutcome::InFlight => tokio::time::sleep(pause).await,
                    _ => break,
                }
            }
        })
    }

    /// Cancels a scheduled trailing sync.
    pub fn cancel_scheduled(&self) -> bool {
        self.inner.debouncer.cancel()
    }

    pub fn has_scheduled_sync(&self) -> bool {
        self.inner.debouncer.is_pending()
    }

    /// Fetches the remote document. `None` when offline, missing, or failing.
    pub async fn pull(&self) -> Option<Value> {
        if !self.is_online() {
            return None;
        }
        match self.inner.remote.load(&self.inner.learner_id).await {
            Ok(document) => document,
            Err(SyncError::NotFound(_)) => None,
            Err(e) => {
                warn!("failed to pull {}: {e}", self.inner.document);
                None
            }
        }
    }
}

fn envelope_key(document: &str) -> String {
    format!("sync-envelope-{document}")
}

/// Projects the snapshot onto the push's fields. Non-object snapshots can
/// only be pushed whole.
fn build_payload(snapshot: &Value, push: &PendingPush) -> (Payload, SyncMode) {
    match snapshot {
        Value::Object(object) if !push.full => {
            let fields = push
                .fields
                .iter()
                .filter_map(|field| {
                    object
                        .get(field)
                        .map(|value| (field.clone(), value.clone()))
                })
                .collect();
            (Payload::Delta(fields), SyncMode::Delta)
        }
        _ => (Payload::Full(snapshot.clone()), SyncMode::Full),
    }
}
