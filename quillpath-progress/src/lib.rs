//! Progress ledger for Quillpath.
//!
//! Owns the learner's [`ProgressState`](quillpath_types::ProgressState) and
//! every mutation of it. Mutations apply synchronously in memory, persist
//! locally, mark the touched fields dirty with the sync reconciler and arm a
//! trailing sync; none of them waits on the network.

mod ledger;
mod outcome;
mod unlock;

pub use ledger::{ProgressLedger, PROGRESS_KEY};
pub use outcome::{MutationOutcome, ProgressPatch, UnlockReport};
