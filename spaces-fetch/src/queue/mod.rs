//! Fixed-concurrency task queue with retry-with-delay semantics.

mod retry_policy;
mod worker_queue;

pub use retry_policy::RetryPolicy;
pub use worker_queue::{
    FetchTask, QueueStats, StageRunner, TaskFailure, TaskHandle, WorkerQueue, WorkerQueueConfig,
};
