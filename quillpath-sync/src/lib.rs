//! Sync reconciler for Quillpath.
//!
//! Reconciles local-first state with a remote store without blocking the UI:
//! - Field-level dirty tracking with revisions (delta pushes)
//! - Connectivity gating and a minimum interval between pushes
//! - Bounded retry with exponential backoff for transient failures
//! - An explicit debounced task for trailing syncs after bursts of edits
//!
//! The reconciler is document-agnostic: it works on JSON snapshots and
//! top-level field names, so the same type serves learner progress and
//! project content.

pub mod config;
pub mod connectivity;
pub mod debounce;
pub mod dirty;
pub mod error;
pub mod reconciler;
pub mod remote;
pub mod types;

pub use config::SyncConfig;
pub use connectivity::{Connectivity, ConnectivityFlag};
pub use debounce::Debouncer;
pub use error::{SyncError, SyncResult};
pub use reconciler::SyncReconciler;
pub use remote::RemoteStore;
pub use types::*;
