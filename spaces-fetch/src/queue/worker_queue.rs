//! Bounded-concurrency worker queue.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc, oneshot};
use tracing::{debug, info, warn};

use super::retry_policy::RetryPolicy;
use crate::Result;
use crate::cache::Artifact;

/// Configuration for the worker queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerQueueConfig {
    /// Maximum number of tasks running at once.
    pub concurrency: usize,
}

impl Default for WorkerQueueConfig {
    fn default() -> Self {
        Self { concurrency: 2 }
    }
}

/// A unit of fetch work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    pub locator: String,
    /// Job to report progress against, if the request is tracked.
    pub job_id: Option<String>,
}

impl FetchTask {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            job_id: None,
        }
    }

    pub fn for_job(locator: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            job_id: Some(job_id.into()),
        }
    }

    fn job_label(&self) -> &str {
        self.job_id.as_deref().unwrap_or("-")
    }
}

/// Final failure of a task after all attempts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TaskFailure {
    /// Error message of the last attempt.
    pub message: String,
    pub attempts: u32,
}

/// Work performed for each attempt of a task.
#[async_trait]
pub trait StageRunner: Send + Sync {
    /// Run one attempt. `attempt` starts at 1.
    async fn run(&self, task: &FetchTask, attempt: u32) -> Result<Artifact>;
}

/// Resolves once the task has succeeded or exhausted its attempts.
#[derive(Debug)]
pub struct TaskHandle {
    rx: oneshot::Receiver<std::result::Result<Artifact, TaskFailure>>,
}

impl TaskHandle {
    pub async fn wait(self) -> std::result::Result<Artifact, TaskFailure> {
        self.rx.await.unwrap_or_else(|_| {
            Err(TaskFailure {
                message: "Fetch task ended without reporting a result".to_string(),
                attempts: 0,
            })
        })
    }
}

/// Snapshot of queue occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Tasks waiting for a free slot.
    pub queued: usize,
    pub running: usize,
    pub total: usize,
}

#[derive(Debug, Default)]
struct Counters {
    queued: AtomicUsize,
    running: AtomicUsize,
}

struct Pending {
    task: FetchTask,
    reply: oneshot::Sender<std::result::Result<Artifact, TaskFailure>>,
}

/// Holds a worker slot; releases it and the running count on drop.
struct RunningSlot {
    counters: Arc<Counters>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for RunningSlot {
    fn drop(&mut self) {
        self.counters.running.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs [`FetchTask`]s through a [`StageRunner`] with at most `concurrency`
/// tasks in flight.
///
/// Tasks are admitted in enqueue order. A task keeps its slot across retries
/// and retry delays.
pub struct WorkerQueue {
    config: WorkerQueueConfig,
    retry: RetryPolicy,
    tx: mpsc::UnboundedSender<Pending>,
    counters: Arc<Counters>,
}

impl WorkerQueue {
    /// Create the queue and start its dispatcher.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: WorkerQueueConfig,
        retry: RetryPolicy,
        runner: Arc<dyn StageRunner>,
    ) -> Self {
        let concurrency = config.concurrency.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());

        tokio::spawn(dispatch(
            rx,
            Arc::new(Semaphore::new(concurrency)),
            runner,
            retry.clone(),
            counters.clone(),
        ));

        info!(
            concurrency,
            max_retries = retry.max_retries,
            retry_delay_ms = retry.retry_delay_ms,
            "Started worker queue"
        );

        Self {
            config,
            retry,
            tx,
            counters,
        }
    }

    /// Submit a task. It starts once a slot is free.
    pub fn enqueue(&self, task: FetchTask) -> TaskHandle {
        let (reply, rx) = oneshot::channel();
        debug!(locator = %task.locator, job_id = %task.job_label(), "Enqueued fetch task");

        self.counters.queued.fetch_add(1, Ordering::SeqCst);
        if let Err(mpsc::error::SendError(pending)) = self.tx.send(Pending { task, reply }) {
            self.counters.queued.fetch_sub(1, Ordering::SeqCst);
            let _ = pending.reply.send(Err(TaskFailure {
                message: "Worker queue is not running".to_string(),
                attempts: 0,
            }));
        }

        TaskHandle { rx }
    }

    pub fn stats(&self) -> QueueStats {
        let queued = self.counters.queued.load(Ordering::SeqCst);
        let running = self.counters.running.load(Ordering::SeqCst);
        QueueStats {
            queued,
            running,
            total: queued + running,
        }
    }

    pub fn config(&self) -> &WorkerQueueConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}

async fn dispatch(
    mut rx: mpsc::UnboundedReceiver<Pending>,
    semaphore: Arc<Semaphore>,
    runner: Arc<dyn StageRunner>,
    retry: RetryPolicy,
    counters: Arc<Counters>,
) {
    while let Some(pending) = rx.recv().await {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };

        counters.queued.fetch_sub(1, Ordering::SeqCst);
        counters.running.fetch_add(1, Ordering::SeqCst);
        let slot = RunningSlot {
            counters: counters.clone(),
            _permit: permit,
        };

        let runner = runner.clone();
        let retry = retry.clone();
        tokio::spawn(async move {
            let result = run_with_retries(runner.as_ref(), &retry, &pending.task).await;
            drop(slot);
            if pending.reply.send(result).is_err() {
                debug!(locator = %pending.task.locator, "Task result dropped; no one is waiting");
            }
        });
    }
    debug!("Worker queue dispatcher stopped");
}

async fn run_with_retries(
    runner: &dyn StageRunner,
    retry: &RetryPolicy,
    task: &FetchTask,
) -> std::result::Result<Artifact, TaskFailure> {
    let mut attempt = 1;
    loop {
        match runner.run(task, attempt).await {
            Ok(artifact) => {
                debug!(locator = %task.locator, job_id = %task.job_label(), attempt, "Fetch task succeeded");
                return Ok(artifact);
            }
            Err(e) if e.is_retryable() && retry.should_retry(attempt) => {
                warn!(
                    locator = %task.locator,
                    job_id = %task.job_label(),
                    attempt,
                    max_attempts = retry.max_attempts(),
                    error = %e,
                    "Fetch attempt failed, retrying after {}ms",
                    retry.retry_delay_ms
                );
                tokio::time::sleep(retry.delay()).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(
                    locator = %task.locator,
                    job_id = %task.job_label(),
                    attempts = attempt,
                    error = %e,
                    "Fetch task failed"
                );
                return Err(TaskFailure {
                    message: e.to_string(),
                    attempts: attempt,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::time::Duration;

    fn artifact(locator: &str) -> Artifact {
        Artifact::new(PathBuf::from(format!("/tmp/{locator}.mp3")), false)
    }

    /// Tracks how many runs overlap.
    #[derive(Default)]
    struct OverlapRunner {
        current: AtomicUsize,
        peak: AtomicUsize,
        order: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StageRunner for OverlapRunner {
        async fn run(&self, task: &FetchTask, _attempt: u32) -> Result<Artifact> {
            self.order.lock().push(task.locator.clone());
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(artifact(&task.locator))
        }
    }

    /// Fails the first `failures` attempts.
    struct FlakyRunner {
        failures: u32,
        calls: AtomicUsize,
        error: fn(u32) -> Error,
    }

    #[async_trait]
    impl StageRunner for FlakyRunner {
        async fn run(&self, task: &FetchTask, attempt: u32) -> Result<Artifact> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if attempt <= self.failures {
                return Err((self.error)(attempt));
            }
            Ok(artifact(&task.locator))
        }
    }

    #[tokio::test]
    async fn never_exceeds_concurrency() {
        let runner = Arc::new(OverlapRunner::default());
        let queue = WorkerQueue::new(
            WorkerQueueConfig { concurrency: 2 },
            RetryPolicy::no_retry(),
            runner.clone(),
        );

        let handles: Vec<_> = (0..6)
            .map(|i| queue.enqueue(FetchTask::new(format!("L{i}"))))
            .collect();
        for handle in handles {
            handle.wait().await.unwrap();
        }

        assert_eq!(runner.peak.load(Ordering::SeqCst), 2);
        assert_eq!(queue.stats(), QueueStats::default());
    }

    #[tokio::test]
    async fn admits_tasks_in_enqueue_order() {
        let runner = Arc::new(OverlapRunner::default());
        let queue = WorkerQueue::new(
            WorkerQueueConfig { concurrency: 1 },
            RetryPolicy::no_retry(),
            runner.clone(),
        );

        let handles: Vec<_> = (0..5)
            .map(|i| queue.enqueue(FetchTask::new(format!("L{i}"))))
            .collect();
        for handle in handles {
            handle.wait().await.unwrap();
        }

        assert_eq!(*runner.order.lock(), vec!["L0", "L1", "L2", "L3", "L4"]);
    }

    #[tokio::test]
    async fn failing_task_runs_max_retries_plus_one_times() {
        let runner = Arc::new(FlakyRunner {
            failures: u32::MAX,
            calls: AtomicUsize::new(0),
            error: |attempt| Error::fetch(format!("attempt {attempt} failed")),
        });
        let queue = WorkerQueue::new(
            WorkerQueueConfig::default(),
            RetryPolicy::new(2, 0),
            runner.clone(),
        );

        let failure = queue.enqueue(FetchTask::new("L")).wait().await.unwrap_err();
        assert_eq!(runner.calls.load(Ordering::SeqCst), 3);
        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.message, "attempt 3 failed");
    }

    #[tokio::test]
    async fn transient_failure_recovers() {
        let runner = Arc::new(FlakyRunner {
            failures: 1,
            calls: AtomicUsize::new(0),
            error: |_| Error::fetch("flaky"),
        });
        let queue = WorkerQueue::new(
            WorkerQueueConfig::default(),
            RetryPolicy::new(2, 0),
            runner.clone(),
        );

        let artifact = queue.enqueue(FetchTask::new("L")).wait().await.unwrap();
        assert_eq!(artifact.filename, "L.mp3");
        assert_eq!(runner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn validation_errors_are_not_retried() {
        let runner = Arc::new(FlakyRunner {
            failures: u32::MAX,
            calls: AtomicUsize::new(0),
            error: |_| Error::validation("bad locator"),
        });
        let queue = WorkerQueue::new(
            WorkerQueueConfig::default(),
            RetryPolicy::new(2, 0),
            runner.clone(),
        );

        let failure = queue.enqueue(FetchTask::new("L")).wait().await.unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
    }

    struct GatedRunner {
        gate: Semaphore,
    }

    #[async_trait]
    impl StageRunner for GatedRunner {
        async fn run(&self, task: &FetchTask, _attempt: u32) -> Result<Artifact> {
            let _pass = self
                .gate
                .acquire()
                .await
                .map_err(|e| Error::Other(e.to_string()))?;
            Ok(artifact(&task.locator))
        }
    }

    #[tokio::test]
    async fn stats_report_waiting_and_running_tasks() {
        let runner = Arc::new(GatedRunner {
            gate: Semaphore::new(0),
        });
        let queue = WorkerQueue::new(
            WorkerQueueConfig { concurrency: 1 },
            RetryPolicy::no_retry(),
            runner.clone(),
        );

        let handles: Vec<_> = (0..3)
            .map(|i| queue.enqueue(FetchTask::new(format!("L{i}"))))
            .collect();

        let expected = QueueStats {
            queued: 2,
            running: 1,
            total: 3,
        };
        for _ in 0..100 {
            if queue.stats() == expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(queue.stats(), expected);

        runner.gate.add_permits(3);
        for handle in handles {
            handle.wait().await.unwrap();
        }
        assert_eq!(queue.stats(), QueueStats::default());
    }
}
