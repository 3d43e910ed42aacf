//! Cancellable trailing-edge task scheduling.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

/// Runs the most recently scheduled task after a quiet period.
///
/// Scheduling again before the delay elapses replaces the pending task,
/// so a burst of calls collapses into one run. A task that has already
/// started is never aborted; it runs to completion alongside its
/// replacement.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<Pending>>,
}

struct Pending {
    handle: JoinHandle<()>,
    /// Set once the delay has elapsed and the task body is running.
    started: Arc<AtomicBool>,
}

impl Pending {
    fn is_waiting(&self) -> bool {
        !self.started.load(Ordering::SeqCst) && !self.handle.is_finished()
    }

    /// Aborts the task if it is still in its delay. Returns whether it did.
    fn abort_if_waiting(&self) -> bool {
        if self.is_waiting() {
            self.handle.abort();
            return true;
        }
        false
    }
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Arms `task` to run after the delay, replacing any task still waiting.
    ///
    /// Returns false when called outside a Tokio runtime; nothing is
    /// scheduled in that case.
    pub fn schedule<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            debug!("no async runtime, skipping debounced task");
            return false;
        };
        let delay = self.delay;
        let started = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&started);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            flag.store(true, Ordering::SeqCst);
            task.await;
        });
        let previous = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Pending { handle, started });
        if let Some(previous) = previous {
            previous.abort_if_waiting();
        }
        true
    }

    /// Drops the task if it is still waiting out its delay. Returns true if
    /// one was dropped; a task already running is left to finish.
    pub fn cancel(&self) -> bool {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        pending.is_some_and(|pending| pending.abort_if_waiting())
    }

    /// Whether a task is waiting or running.
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|pending| !pending.handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
