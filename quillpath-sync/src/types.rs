//! Shared types for sync operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Persisted snapshot of the reconciler's view of local vs. remote state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEnvelope {
    /// Local state differs from the last confirmed remote state.
    pub dirty: bool,
    pub last_sync_timestamp: Option<DateTime<Utc>>,
    /// Top-level fields changed since the last confirmed push.
    #[serde(default)]
    pub changed_fields: BTreeSet<String>,
    /// The next push must carry the whole document.
    #[serde(default)]
    pub full_required: bool,
}

/// Shape of a push.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    /// Whole document.
    Full,
    /// Changed top-level fields only.
    Delta,
}

/// Result of a sync attempt. Never an error: failures leave the state dirty
/// for the next attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The remote store acknowledged the push.
    Pushed { mode: SyncMode, fields: usize },
    /// Nothing to push.
    Clean,
    /// No connectivity; the push will be retried later.
    Offline,
    /// Another push is running.
    InFlight,
    /// Inside the minimum interval since the last successful push.
    Debounced { retry_in: Duration },
    /// The push failed after exhausting retries.
    Failed { error: String },
}

impl SyncOutcome {
    pub fn is_pushed(&self) -> bool {
        matches!(self, SyncOutcome::Pushed { .. })
    }

    /// Whether local changes are still waiting for the remote store.
    pub fn would_retry(&self) -> bool {
        !matches!(self, SyncOutcome::Pushed { .. } | SyncOutcome::Clean)
    }
}
