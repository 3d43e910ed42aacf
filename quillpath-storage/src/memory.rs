//! In-process storage backends.

use crate::Storage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Process-local storage. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    blobs: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, blob: &str) {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), blob.to_string());
    }

    fn remove(&self, key: &str) {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Storage for platforms without persistent storage. Reads are always
/// empty and writes are dropped.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableStorage;

impl Storage for UnavailableStorage {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _blob: &str) {}

    fn remove(&self, _key: &str) {}
}
