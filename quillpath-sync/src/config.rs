//! Sync reconciler configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and retry settings for the reconciler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minimum time between successful non-forced pushes (seconds).
    pub min_interval_secs: u64,

    /// Quiet period before a scheduled trailing sync runs (milliseconds).
    pub debounce_delay_ms: u64,

    /// Retries after the first failed push attempt.
    pub max_retries: u32,

    /// Backoff before the first retry, doubled for each further retry (milliseconds).
    pub retry_backoff_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 10,
            debounce_delay_ms: 2000,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

impl SyncConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_delay_ms)
    }

    /// Backoff before retry number `attempt` (0-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(1u64 << attempt.min(16)))
    }
}
