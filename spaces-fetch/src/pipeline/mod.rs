//! Request orchestration.
//!
//! A request is either served straight from the artifact cache or turned into
//! a task on the worker queue. Asynchronous requests are tracked as jobs whose
//! terminal state is reported by exactly one supervising task.

mod orchestrator;
mod stage;

pub use orchestrator::{
    DOWNLOAD_JOB, Orchestrator, OrchestratorConfig, QueueStatus, SUMMARIZE_JOB, SummaryOutcome,
};
pub use stage::FetchStage;
