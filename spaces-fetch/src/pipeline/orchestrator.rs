//! Fetch orchestrator.
//!
//! Ties the artifact cache, worker queue and job registry together for the
//! synchronous and asynchronous request modes, and chains downloads into
//! upload and summarization.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};
use url::Url;

use super::stage::FetchStage;
use crate::cache::{Artifact, ArtifactCache};
use crate::downloader::{FetchTool, ProgressConfig};
use crate::jobs::{JobRegistry, JobStats, JobStatus, JobUpdate, LogLevel};
use crate::queue::{FetchTask, QueueStats, RetryPolicy, WorkerQueue, WorkerQueueConfig};
use crate::summarize::{PromptOptions, SummaryBackend, UploadedFile};
use crate::utils::fs;
use crate::{Error, Result};

/// Job type tag for download jobs.
pub const DOWNLOAD_JOB: &str = "download";
/// Job type tag for download + summarize jobs.
pub const SUMMARIZE_JOB: &str = "summarize";

/// Queue and progress settings for the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    pub queue: WorkerQueueConfig,
    pub retry: RetryPolicy,
    pub progress: ProgressConfig,
}

/// Result of a synchronous summarize request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryOutcome {
    pub summary: String,
    pub audio_file: Artifact,
    pub uploaded_file: UploadedFile,
}

/// Combined queue and job counters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueStatus {
    pub stats: QueueStats,
    pub jobs: JobStats,
}

/// Trim a locator and accept it only as an absolute http(s) URL.
fn validate_locator(locator: &str) -> Result<&str> {
    let locator = locator.trim();
    if locator.is_empty() {
        return Err(Error::validation("Spaces URL is required"));
    }
    match Url::parse(locator) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(locator),
        _ => Err(Error::validation(format!("Invalid Spaces URL: {locator}"))),
    }
}

fn artifact_json(artifact: &Artifact) -> serde_json::Value {
    serde_json::to_value(artifact).unwrap_or(serde_json::Value::Null)
}

/// State shared with supervising tasks.
struct Shared {
    cache: ArtifactCache,
    registry: Arc<JobRegistry>,
    queue: WorkerQueue,
    summary: Option<SummaryBackend>,
}

impl Shared {
    async fn fail_job(&self, job_id: &str, message: String) {
        if let Err(e) = self
            .registry
            .update_job(job_id, JobStatus::Failed, JobUpdate::error(message))
            .await
        {
            warn!(job_id = %job_id, error = %e, "Could not mark job as failed");
        }
    }

    async fn advance(&self, job_id: &str, status: JobStatus) {
        if let Err(e) = self
            .registry
            .update_job(job_id, status, JobUpdate::none())
            .await
        {
            warn!(job_id = %job_id, status = %status, error = %e, "Could not advance job");
        }
    }

    async fn complete_job(&self, job_id: &str, result: serde_json::Value) {
        if let Err(e) = self
            .registry
            .update_job(job_id, JobStatus::Completed, JobUpdate::result(result))
            .await
        {
            warn!(job_id = %job_id, error = %e, "Could not mark job as completed");
        }
    }

    /// Cached artifact, or a queued fetch reported against `job_id`.
    async fn obtain_audio(&self, locator: &str, job_id: &str) -> Result<Artifact> {
        if let Some(path) = self.cache.lookup(locator) {
            self.registry
                .add_log(job_id, "Found cached audio file", LogLevel::Info, None)
                .await;
            return Ok(Artifact::new(path, true));
        }
        self.queue
            .enqueue(FetchTask::for_job(locator, job_id))
            .wait()
            .await
            .map_err(|failure| Error::Fetch(failure.message))
    }

    async fn supervise_download(self: Arc<Self>, job_id: String, locator: String) {
        let handle = self.queue.enqueue(FetchTask::for_job(&locator, &job_id));
        match handle.wait().await {
            Ok(artifact) => {
                info!(job_id = %job_id, path = %artifact.output_path.display(), "Download job completed");
                self.complete_job(&job_id, artifact_json(&artifact)).await;
            }
            Err(failure) => {
                warn!(job_id = %job_id, attempts = failure.attempts, "Download job failed: {}", failure.message);
                self.fail_job(&job_id, failure.message).await;
            }
        }
    }

    async fn supervise_summary(
        self: Arc<Self>,
        backend: SummaryBackend,
        job_id: String,
        locator: String,
        options: PromptOptions,
    ) {
        match self.run_summary(&backend, &job_id, &locator, &options).await {
            Ok(result) => {
                info!(job_id = %job_id, "Summarize job completed");
                self.complete_job(&job_id, result).await;
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Summarize job failed");
                self.fail_job(&job_id, e.to_string()).await;
            }
        }
    }

    async fn run_summary(
        &self,
        backend: &SummaryBackend,
        job_id: &str,
        locator: &str,
        options: &PromptOptions,
    ) -> Result<serde_json::Value> {
        let artifact = self.obtain_audio(locator, job_id).await?;

        self.advance(job_id, JobStatus::Uploading).await;
        self.registry
            .add_log(
                job_id,
                format!("Uploading {}", artifact.filename),
                LogLevel::Info,
                Some(artifact_json(&artifact)),
            )
            .await;
        let uploaded = backend.uploader.upload(&artifact.output_path).await?;

        self.advance(job_id, JobStatus::Summarizing).await;
        self.registry
            .add_log(
                job_id,
                format!("Uploaded as {}", uploaded.uri),
                LogLevel::Info,
                None,
            )
            .await;
        let summary = backend.summarizer.summarize(&uploaded, options).await?;

        Ok(serde_json::json!({
            "summary": summary,
            "audioFile": artifact_json(&artifact),
            "uploadedFile": {
                "uri": uploaded.uri,
                "fileName": uploaded.file_name,
            },
        }))
    }
}

/// Entry point for fetch and summarize requests.
pub struct Orchestrator {
    shared: Arc<Shared>,
    tracker: TaskTracker,
}

impl Orchestrator {
    /// Build the orchestrator and start its worker queue.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        cache: ArtifactCache,
        registry: Arc<JobRegistry>,
        tool: Arc<dyn FetchTool>,
        summary: Option<SummaryBackend>,
        config: OrchestratorConfig,
    ) -> Self {
        let stage = FetchStage::new(
            cache.clone(),
            tool,
            registry.clone(),
            config.progress,
            config.retry.max_attempts(),
        );
        let queue = WorkerQueue::new(config.queue, config.retry, Arc::new(stage));

        Self {
            shared: Arc::new(Shared {
                cache,
                registry,
                queue,
                summary,
            }),
            tracker: TaskTracker::new(),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.shared.registry
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.shared.cache
    }

    pub fn summarization_enabled(&self) -> bool {
        self.shared.summary.is_some()
    }

    fn summary_backend(&self) -> Result<&SummaryBackend> {
        self.shared.summary.as_ref().ok_or_else(|| {
            Error::ServiceUnavailable("Google API Key not configured".to_string())
        })
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.tracker.is_closed() {
            return Err(Error::ShuttingDown);
        }
        Ok(())
    }

    /// Fetch a locator and wait for the artifact.
    pub async fn fetch_sync(&self, locator: &str) -> Result<Artifact> {
        let locator = validate_locator(locator)?;

        if let Some(path) = self.shared.cache.lookup(locator) {
            info!(locator = %locator, "Serving cached audio");
            return Ok(Artifact::new(path, true));
        }

        self.shared
            .queue
            .enqueue(FetchTask::new(locator))
            .wait()
            .await
            .map_err(|failure| Error::Fetch(failure.message))
    }

    /// Start a tracked fetch and return its job id immediately.
    pub async fn fetch_async(&self, locator: &str) -> Result<String> {
        let locator = validate_locator(locator)?;
        self.ensure_accepting()?;

        let registry = &self.shared.registry;
        let job_id = registry
            .create_job(DOWNLOAD_JOB, serde_json::json!({ "spacesUrl": locator }))
            .await;

        if let Some(path) = self.shared.cache.lookup(locator) {
            let artifact = Artifact::new(path, true);
            registry
                .add_log(&job_id, "Found cached audio file", LogLevel::Info, None)
                .await;
            self.shared
                .complete_job(&job_id, artifact_json(&artifact))
                .await;
            return Ok(job_id);
        }

        self.shared.advance(&job_id, JobStatus::Processing).await;
        registry
            .add_log(&job_id, "Queued for download", LogLevel::Info, None)
            .await;

        self.tracker.spawn(
            self.shared
                .clone()
                .supervise_download(job_id.clone(), locator.to_string()),
        );
        Ok(job_id)
    }

    /// Fetch, upload and summarize, waiting for the summary.
    pub async fn summarize_sync(
        &self,
        locator: &str,
        options: &PromptOptions,
    ) -> Result<SummaryOutcome> {
        let locator = validate_locator(locator)?;
        let backend = self.summary_backend()?;
        let artifact = self.fetch_sync(locator).await?;
        let uploaded = backend.uploader.upload(&artifact.output_path).await?;
        let summary = backend.summarizer.summarize(&uploaded, options).await?;

        Ok(SummaryOutcome {
            summary,
            audio_file: artifact,
            uploaded_file: uploaded,
        })
    }

    /// Start a tracked fetch + summarize and return its job id immediately.
    pub async fn summarize_async(&self, locator: &str, options: PromptOptions) -> Result<String> {
        let locator = validate_locator(locator)?;
        let backend = self.summary_backend()?.clone();
        self.ensure_accepting()?;

        let mut params = serde_json::json!({ "spacesUrl": locator });
        if let Some(prompt_type) = &options.prompt_type {
            params["promptType"] = prompt_type.clone().into();
        }
        if let Some(custom_prompt) = &options.custom_prompt {
            params["customPrompt"] = custom_prompt.clone().into();
        }

        let job_id = self
            .shared
            .registry
            .create_job(SUMMARIZE_JOB, params)
            .await;
        self.shared.advance(&job_id, JobStatus::Processing).await;

        self.tracker.spawn(self.shared.clone().supervise_summary(
            backend,
            job_id.clone(),
            locator.to_string(),
            options,
        ));
        Ok(job_id)
    }

    /// Upload a local audio file.
    pub async fn upload(&self, path: &Path) -> Result<UploadedFile> {
        let backend = self.summary_backend()?;
        if !fs::is_file(path) {
            return Err(Error::not_found("File", path.display().to_string()));
        }
        backend.uploader.upload(path).await
    }

    /// Summarize a file that was uploaded earlier.
    pub async fn summarize_uploaded(
        &self,
        file: &UploadedFile,
        options: &PromptOptions,
    ) -> Result<String> {
        self.summary_backend()?
            .summarizer
            .summarize(file, options)
            .await
    }

    /// Previews of the available prompts.
    pub fn prompts(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.summary_backend()?.prompts.previews())
    }

    pub async fn queue_status(&self) -> QueueStatus {
        QueueStatus {
            stats: self.shared.queue.stats(),
            jobs: self.shared.registry.stats().await,
        }
    }

    /// Stop accepting async requests and wait for running jobs to settle.
    pub async fn shutdown(&self) {
        self.tracker.close();
        info!(pending = self.tracker.len(), "Waiting for background jobs to finish");
        self.tracker.wait().await;
    }
}
