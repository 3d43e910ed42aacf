//! Scheduler configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits and timings for exercise prefetching.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound on cached exercises per level.
    pub max_per_level: usize,

    /// Pause between background generation requests (milliseconds).
    pub request_delay_ms: u64,

    /// Retries per exercise after the first failed attempt.
    pub max_retries: u32,

    /// Fixed pause between retries (milliseconds).
    pub retry_delay_ms: u64,

    /// Pause before an interrupted task resumes on cold start (milliseconds).
    pub resume_delay_ms: u64,

    /// Cache entries untouched for longer than this are purged (days).
    pub retention_days: i64,

    /// Poll period of `wait_for_exercise` (milliseconds).
    pub wait_poll_ms: u64,

    /// Upper bound on `wait_for_exercise` (seconds).
    pub max_wait_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_per_level: 5,
            request_delay_ms: 1000,
            max_retries: 2,
            retry_delay_ms: 2000,
            resume_delay_ms: 3000,
            retention_days: 7,
            wait_poll_ms: 500,
            max_wait_secs: 30,
        }
    }
}

impl SchedulerConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn resume_delay(&self) -> Duration {
        Duration::from_millis(self.resume_delay_ms)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days.max(0))
    }

    pub fn wait_poll(&self) -> Duration {
        Duration::from_millis(self.wait_poll_ms.max(1))
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}
