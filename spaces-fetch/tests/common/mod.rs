//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

use spaces_fetch::cache::ArtifactCache;
use spaces_fetch::downloader::{FetchTool, ProgressConfig, partial_path};
use spaces_fetch::jobs::{Job, JobLogStore, JobRegistry};
use spaces_fetch::pipeline::{Orchestrator, OrchestratorConfig};
use spaces_fetch::queue::{RetryPolicy, WorkerQueueConfig};
use spaces_fetch::summarize::{
    FileUploader, PromptCatalog, PromptOptions, Summarizer, SummaryBackend, UploadedFile,
};
use spaces_fetch::{Error, Result};

/// Behaviour of a [`FakeTool`] invocation.
#[derive(Debug, Clone)]
pub enum Script {
    /// Write `bytes` to the destination after `delay`.
    Succeed { bytes: usize, delay: Duration },
    /// Grow a `.part` file to `bytes`, hold it, then move it into place.
    Partial { bytes: usize, hold: Duration },
    /// Fail every call with this message.
    Fail(String),
    /// Fail the first `n` calls, then succeed.
    FailTimes(u32),
}

/// A fetch tool that writes files itself instead of running a process.
pub struct FakeTool {
    script: Script,
    calls: AtomicU32,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeTool {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicU32::new(0),
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchTool for FakeTool {
    fn name(&self) -> &str {
        "fake-tool"
    }

    async fn fetch(&self, _locator: &str, dest: &Path) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let result = match &self.script {
            Script::Succeed { bytes, delay } => {
                tokio::time::sleep(*delay).await;
                tokio::fs::write(dest, vec![0u8; *bytes]).await.map_err(Error::from)
            }
            Script::Partial { bytes, hold } => {
                let partial = partial_path(dest);
                tokio::fs::write(&partial, vec![0u8; *bytes]).await?;
                tokio::time::sleep(*hold).await;
                tokio::fs::rename(&partial, dest).await.map_err(Error::from)
            }
            Script::Fail(message) => {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Err(Error::fetch(message.clone()))
            }
            Script::FailTimes(n) => {
                if call <= *n {
                    Err(Error::fetch(format!("transient failure {call}")))
                } else {
                    tokio::fs::write(dest, b"audio").await.map_err(Error::from)
                }
            }
        };

        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Uploader and summarizer that never leave the process.
pub struct FakeSummaryService {
    pub fail_summarize: bool,
}

#[async_trait]
impl FileUploader for FakeSummaryService {
    async fn upload(&self, path: &Path) -> Result<UploadedFile> {
        if !path.is_file() {
            return Err(Error::not_found("File", path.display().to_string()));
        }
        let mut file = UploadedFile::from_uri("https://files.test/v1beta/files/abc123", None);
        file.original_path = Some(path.to_path_buf());
        Ok(file)
    }
}

#[async_trait]
impl Summarizer for FakeSummaryService {
    async fn summarize(&self, file: &UploadedFile, options: &PromptOptions) -> Result<String> {
        if self.fail_summarize {
            return Err(Error::Summarize("model overloaded".to_string()));
        }
        let prompt = options.prompt_type.as_deref().unwrap_or("default");
        Ok(format!("summary of {} using {prompt}", file.file_name))
    }
}

pub fn fake_backend(fail_summarize: bool) -> SummaryBackend {
    let service = Arc::new(FakeSummaryService { fail_summarize });
    SummaryBackend {
        uploader: service.clone(),
        summarizer: service,
        prompts: PromptCatalog::builtin(),
    }
}

pub fn fast_config(concurrency: usize, max_retries: u32) -> OrchestratorConfig {
    OrchestratorConfig {
        queue: WorkerQueueConfig { concurrency },
        retry: RetryPolicy::new(max_retries, 10),
        progress: ProgressConfig {
            poll_interval_ms: 10,
            threshold_bytes: 0,
        },
    }
}

/// An orchestrator over temporary directories.
pub struct Harness {
    pub dir: TempDir,
    pub cache: ArtifactCache,
    pub orchestrator: Arc<Orchestrator>,
}

impl Harness {
    pub fn new(
        tool: Arc<dyn FetchTool>,
        summary: Option<SummaryBackend>,
        config: OrchestratorConfig,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let cache = ArtifactCache::new(dir.path().join("audios"));
        std::fs::create_dir_all(cache.output_dir()).unwrap();
        let registry = Arc::new(JobRegistry::new(JobLogStore::new(dir.path().join("jobs"))));
        let orchestrator = Arc::new(Orchestrator::new(
            cache.clone(),
            registry,
            tool,
            summary,
            config,
        ));
        Self {
            dir,
            cache,
            orchestrator,
        }
    }

    pub fn job_log_dir(&self) -> PathBuf {
        self.dir.path().join("jobs")
    }

    /// Put a file where the cache expects `locator`'s artifact.
    pub fn seed_cache(&self, locator: &str) -> PathBuf {
        let path = self.cache.artifact_path(locator);
        std::fs::write(&path, b"cached audio").unwrap();
        path
    }

    /// Poll until the job reaches a terminal state.
    pub async fn wait_terminal(&self, job_id: &str) -> Job {
        let registry = self.orchestrator.registry();
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if let Some(status) = registry.status(job_id).await
                    && status.is_terminal()
                {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("job did not finish in time");
        registry.get_job(job_id).await.unwrap()
    }
}
