//! Directory-backed storage: one file per key.

use crate::error::StorageResult;
use crate::Storage;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Persists each key as `<dir>/<key>.json`.
///
/// Writes go to a temporary sibling first and are renamed into place so a
/// crash mid-write never leaves a truncated blob behind.
#[derive(Clone, Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens (creating if needed) a storage directory.
    pub fn open(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }

    fn write(&self, key: &str, blob: &str) -> StorageResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Maps a key onto a safe file stem.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(blob) => Some(blob),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!("failed to read storage key {key}: {e}");
                None
            }
        }
    }

    fn set(&self, key: &str, blob: &str) {
        if let Err(e) = self.write(key, blob) {
            warn!("failed to write storage key {key}: {e}");
        } else {
            debug!("wrote storage key {key} ({} bytes)", blob.len());
        }
    }

    fn remove(&self, key: &str) {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("failed to remove storage key {key}: {e}"),
        }
    }
}
