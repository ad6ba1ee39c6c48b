//! The fetch stage run by the worker queue for every attempt.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::Result;
use crate::cache::{Artifact, ArtifactCache};
use crate::downloader::{FetchTool, ProgressConfig, ProgressMonitor, ProgressSink, describe_progress};
use crate::jobs::{JobRegistry, JobStatus, JobUpdate, LogLevel};
use crate::queue::{FetchTask, StageRunner};

/// Streams size-based progress into a job's log.
struct JobProgressSink {
    registry: Arc<JobRegistry>,
    job_id: String,
}

#[async_trait]
impl ProgressSink for JobProgressSink {
    async fn on_progress(&self, bytes: u64) {
        self.registry
            .add_log(
                &self.job_id,
                describe_progress(bytes),
                LogLevel::Progress,
                Some(serde_json::json!({ "bytes": bytes })),
            )
            .await;
    }
}

/// Cache re-check, fetch tool invocation and progress reporting for one attempt.
pub struct FetchStage {
    cache: ArtifactCache,
    tool: Arc<dyn FetchTool>,
    registry: Arc<JobRegistry>,
    progress: ProgressConfig,
    max_attempts: u32,
}

impl FetchStage {
    pub fn new(
        cache: ArtifactCache,
        tool: Arc<dyn FetchTool>,
        registry: Arc<JobRegistry>,
        progress: ProgressConfig,
        max_attempts: u32,
    ) -> Self {
        Self {
            cache,
            tool,
            registry,
            progress,
            max_attempts,
        }
    }

    async fn log(&self, job_id: Option<&str>, level: LogLevel, message: String) {
        if let Some(job_id) = job_id {
            self.registry.add_log(job_id, message, level, None).await;
        }
    }

    async fn mark_downloading(&self, job_id: &str) {
        if let Err(e) = self
            .registry
            .update_job(job_id, JobStatus::Downloading, JobUpdate::none())
            .await
        {
            warn!(job_id = %job_id, error = %e, "Could not mark job as downloading");
        }
    }
}

#[async_trait]
impl StageRunner for FetchStage {
    async fn run(&self, task: &FetchTask, attempt: u32) -> Result<Artifact> {
        let job_id = task.job_id.as_deref();

        // An earlier task for the same locator may have finished while this one waited.
        if let Some(path) = self.cache.lookup(&task.locator) {
            debug!(locator = %task.locator, "Cache filled while queued");
            self.log(job_id, LogLevel::Info, "Found cached audio file".to_string())
                .await;
            return Ok(Artifact::new(path, true));
        }

        let dest = self.cache.artifact_path(&task.locator);
        match (job_id, attempt) {
            (None, _) => {}
            (Some(id), 1) => {
                self.mark_downloading(id).await;
                self.log(
                    job_id,
                    LogLevel::Info,
                    format!("Starting download with {}", self.tool.name()),
                )
                .await;
            }
            (Some(_), _) => {
                self.log(
                    job_id,
                    LogLevel::Info,
                    format!("Retrying download (attempt {attempt} of {})", self.max_attempts),
                )
                .await;
            }
        }

        let monitor = job_id.map(|id| {
            let sink = Arc::new(JobProgressSink {
                registry: self.registry.clone(),
                job_id: id.to_string(),
            });
            ProgressMonitor::start(&dest, &self.progress, sink)
        });

        let result = self.tool.fetch(&task.locator, &dest).await;

        if let Some(monitor) = monitor {
            monitor.stop().await;
        }

        match result {
            Ok(()) => {
                self.log(
                    job_id,
                    LogLevel::Success,
                    format!("Download completed: {}", dest.display()),
                )
                .await;
                Ok(Artifact::new(dest, false))
            }
            Err(e) => {
                self.log(job_id, LogLevel::Error, format!("Attempt {attempt} failed: {e}"))
                    .await;
                Err(e)
            }
        }
    }
}
