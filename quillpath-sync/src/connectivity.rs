//! Network reachability check.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Reports whether the remote store is currently reachable.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Shared online/offline flag toggled by the platform layer.
#[derive(Clone, Debug)]
pub struct ConnectivityFlag {
    online: Arc<AtomicBool>,
}

impl ConnectivityFlag {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for ConnectivityFlag {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
