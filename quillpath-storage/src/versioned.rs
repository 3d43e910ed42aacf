//! Versioned JSON blobs on top of [`Storage`].

use crate::error::{StorageError, StorageResult};
use crate::Storage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// On-disk envelope around a persisted value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u32,
    pub data: T,
}

/// Outcome of reading a versioned blob.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadResult<T> {
    Loaded(T),
    /// Nothing stored under the key.
    Missing,
    /// The blob was unreadable or from another version and has been discarded.
    Corrupt,
}

impl<T> LoadResult<T> {
    /// The loaded value, or `fallback()` when missing or corrupt.
    pub fn unwrap_or_else(self, fallback: impl FnOnce() -> T) -> T {
        match self {
            LoadResult::Loaded(value) => value,
            LoadResult::Missing | LoadResult::Corrupt => fallback(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadResult::Loaded(_))
    }
}

fn decode<T: DeserializeOwned>(blob: &str, version: u32) -> StorageResult<T> {
    let envelope: Versioned<T> = serde_json::from_str(blob)?;
    if envelope.version != version {
        return Err(StorageError::VersionMismatch {
            found: envelope.version,
            expected: version,
        });
    }
    Ok(envelope.data)
}

/// Reads and decodes `key`. Corrupt blobs are removed so the next save
/// starts clean.
pub fn load_versioned<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &str,
    version: u32,
) -> LoadResult<T> {
    let Some(blob) = storage.get(key) else {
        return LoadResult::Missing;
    };
    match decode(&blob, version) {
        Ok(value) => LoadResult::Loaded(value),
        Err(e) => {
            warn!("discarding corrupt blob under {key}: {e}");
            storage.remove(key);
            LoadResult::Corrupt
        }
    }
}

/// Encodes and writes `value` under `key`.
pub fn save_versioned<T: Serialize>(storage: &dyn Storage, key: &str, version: u32, value: &T) {
    let envelope = Versioned {
        version,
        data: value,
    };
    match serde_json::to_string(&envelope) {
        Ok(blob) => storage.set(key, &blob),
        Err(e) => warn!("failed to encode blob for {key}: {e}"),
    }
}
