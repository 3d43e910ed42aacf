//! Quillpath core service context.
//!
//! Wires the curriculum, progress ledger, sync reconciler and exercise
//! scheduler together with explicit construction and startup ordering.
//! The UI layer owns one [`ServiceContext`] per learner session.

mod config;
mod context;
mod error;
mod telemetry;

pub use config::AppConfig;
pub use context::{Collaborators, Reconciliation, ServiceContext, StartupReport, PROGRESS_DOCUMENT};
pub use error::{AppError, AppResult};
pub use telemetry::init_tracing;
