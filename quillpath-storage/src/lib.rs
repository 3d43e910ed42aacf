//! Local persistence layer for Quillpath.
//!
//! Stores opaque serialized blobs under string keys. Every backend is safe
//! to call when the underlying platform storage is missing or broken: reads
//! come back empty and writes become no-ops, with the failure logged.
//!
//! # Backends
//!
//! - [`MemoryStorage`]: process-local map, for tests and ephemeral sessions
//! - [`FileStorage`]: one JSON file per key inside a data directory
//! - [`UnavailableStorage`]: stands in when no platform storage exists
//!
//! [`load_versioned`] / [`save_versioned`] wrap blobs in a version envelope
//! and report corrupt or outdated blobs so callers can fall back to defaults.

mod error;
mod file;
mod memory;
mod versioned;

pub use error::{StorageError, StorageResult};
pub use file::FileStorage;
pub use memory::{MemoryStorage, UnavailableStorage};
pub use versioned::{load_versioned, save_versioned, LoadResult, Versioned};

/// Key/value blob storage.
pub trait Storage: Send + Sync {
    /// Returns the blob stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `blob` under `key`, replacing any previous value.
    fn set(&self, key: &str, blob: &str);

    /// Deletes `key`. Missing keys are ignored.
    fn remove(&self, key: &str);
}
