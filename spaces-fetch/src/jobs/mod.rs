//! Job tracking: the job state machine, the in-memory registry and the
//! per-job audit log persisted on disk.

mod log_store;
mod model;
mod registry;

pub use log_store::{JobLogStore, render_text};
pub use model::{Job, JobLogEntry, JobStats, JobStatus, JobSummary, JobUpdate, LogLevel};
pub use registry::JobRegistry;
