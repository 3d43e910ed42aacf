//! Remote store contract.

use crate::error::SyncResult;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Backend document store keyed by learner.
///
/// Implemented by the HTTP client wrapper for both the progress store and
/// the project/content store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Replaces the whole document.
    async fn save(&self, learner_id: &str, document: &Value) -> SyncResult<()>;

    /// Overwrites only the given top-level fields.
    async fn save_partial(&self, learner_id: &str, fields: &Map<String, Value>) -> SyncResult<()>;

    /// Fetches the document, `None` if the learner has none yet.
    async fn load(&self, learner_id: &str) -> SyncResult<Option<Value>>;
}
