//! Field-level change tracking between pushes.
//!
//! Every `mark` bumps a revision counter and stamps the touched fields with
//! it. A push captures the revision it was built from; on acknowledgement
//! only fields stamped at or before that revision are cleared, so a field
//! edited again while the push was in flight stays dirty.

use crate::types::SyncEnvelope;
use std::collections::BTreeMap;

/// Work captured for one push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPush {
    pub revision: u64,
    pub fields: Vec<String>,
    pub full: bool,
}

/// Accumulates dirty fields until the remote store confirms them.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    fields: BTreeMap<String, u64>,
    full_revision: Option<u64>,
    revision: u64,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a tracker from a persisted envelope.
    pub fn from_envelope(envelope: &SyncEnvelope) -> Self {
        let mut tracker = Self::new();
        tracker.mark(envelope.changed_fields.iter().cloned());
        if envelope.full_required || (envelope.dirty && envelope.changed_fields.is_empty()) {
            tracker.mark_full();
        }
        tracker
    }

    /// Records changed fields. Accumulates across calls.
    pub fn mark<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.revision += 1;
        for field in fields {
            self.fields.insert(field.into(), self.revision);
        }
    }

    /// Requires the next push to carry the whole document.
    pub fn mark_full(&mut self) {
        self.revision += 1;
        self.full_revision = Some(self.revision);
    }

    pub fn is_dirty(&self) -> bool {
        !self.fields.is_empty() || self.full_revision.is_some()
    }

    pub fn full_required(&self) -> bool {
        self.full_revision.is_some()
    }

    /// Returns the number of dirty fields.
    pub fn dirty_count(&self) -> usize {
        self.fields.len()
    }

    pub fn dirty_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Captures the current dirty set for a push.
    pub fn checkpoint(&self, force_full: bool) -> PendingPush {
        PendingPush {
            revision: self.revision,
            fields: self.fields.keys().cloned().collect(),
            full: force_full || self.full_required(),
        }
    }

    /// Clears everything the acknowledged push covered.
    pub fn acknowledge(&mut self, push: &PendingPush) {
        self.fields.retain(|_, rev| *rev > push.revision);
        if self.full_revision.is_some_and(|rev| rev <= push.revision) {
            self.full_revision = None;
        }
    }

    /// Snapshot for persistence.
    pub fn to_envelope(&self, last_sync: Option<chrono::DateTime<chrono::Utc>>) -> SyncEnvelope {
        SyncEnvelope {
            dirty: self.is_dirty(),
            last_sync_timestamp: last_sync,
            changed_fields: self.fields.keys().cloned().collect(),
            full_required: self.full_required(),
        }
    }
}
