//! Application configuration.
//!
//! Every section has defaults and can be overridden through environment
//! variables (a `.env` file is loaded by the binary before this runs).
//! Unparseable values are logged and the default is kept.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

use crate::api::ApiServerConfig;
use crate::downloader::{FetchToolConfig, ProgressConfig};
use crate::queue::{RetryPolicy, WorkerQueueConfig};
use crate::summarize::SummarizerConfig;

/// Where artifacts and logs are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub output_dir: PathBuf,
    /// Process log directory.
    pub log_dir: PathBuf,
    /// Per-job audit log directory.
    pub job_log_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./audios"),
            log_dir: PathBuf::from("./logs"),
            job_log_dir: PathBuf::from("./logs/jobs"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(flatten)]
    pub worker: WorkerQueueConfig,
    pub retry: RetryPolicy,
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiServerConfig,
    pub storage: StorageConfig,
    pub queue: QueueConfig,
    pub progress: ProgressConfig,
    pub fetch_tool: FetchToolConfig,
    pub summarizer: SummarizerConfig,
}

/// Reads configuration values by key.
struct Source<F> {
    lookup: F,
}

impl<F> Source<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.string(key)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(key, value = %raw, "Ignoring invalid configuration value");
                None
            }
        }
    }

    fn set_string(&self, key: &str, target: &mut String) {
        if let Some(value) = self.string(key) {
            *target = value;
        }
    }

    fn set_path(&self, key: &str, target: &mut PathBuf) {
        if let Some(value) = self.string(key) {
            *target = PathBuf::from(value);
        }
    }

    fn set_parsed<T: FromStr>(&self, key: &str, target: &mut T) {
        if let Some(value) = self.parsed(key) {
            *target = value;
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key/value source.
    ///
    /// Supported keys: `API_BIND_ADDRESS`, `PORT`, `OUTPUT_DIR`, `LOG_DIR`,
    /// `JOB_LOG_DIR`, `YT_DLP_PATH`, `DOWNLOAD_CONCURRENCY`,
    /// `DOWNLOAD_MAX_RETRIES`, `DOWNLOAD_RETRY_DELAY_MS`,
    /// `PROGRESS_POLL_INTERVAL_MS`, `PROGRESS_THRESHOLD_BYTES`,
    /// `GOOGLE_API_KEY`, `GEMINI_MODEL`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let source = Source { lookup };
        let mut config = Self::default();

        source.set_string("API_BIND_ADDRESS", &mut config.api.bind_address);
        source.set_parsed("PORT", &mut config.api.port);

        source.set_path("OUTPUT_DIR", &mut config.storage.output_dir);
        source.set_path("LOG_DIR", &mut config.storage.log_dir);
        match source.string("JOB_LOG_DIR") {
            Some(dir) => config.storage.job_log_dir = PathBuf::from(dir),
            None => config.storage.job_log_dir = config.storage.log_dir.join("jobs"),
        }

        source.set_string("YT_DLP_PATH", &mut config.fetch_tool.binary_path);

        if let Some(concurrency) = source.parsed::<usize>("DOWNLOAD_CONCURRENCY") {
            if concurrency == 0 {
                warn!("DOWNLOAD_CONCURRENCY must be at least 1; keeping default");
            } else {
                config.queue.worker.concurrency = concurrency;
            }
        }
        source.set_parsed("DOWNLOAD_MAX_RETRIES", &mut config.queue.retry.max_retries);
        source.set_parsed(
            "DOWNLOAD_RETRY_DELAY_MS",
            &mut config.queue.retry.retry_delay_ms,
        );

        source.set_parsed(
            "PROGRESS_POLL_INTERVAL_MS",
            &mut config.progress.poll_interval_ms,
        );
        source.set_parsed(
            "PROGRESS_THRESHOLD_BYTES",
            &mut config.progress.threshold_bytes,
        );

        config.summarizer.api_key = source.string("GOOGLE_API_KEY");
        source.set_string("GEMINI_MODEL", &mut config.summarizer.model);

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = load(&[]);
        assert_eq!(config.api.port, 3000);
        assert_eq!(config.storage.output_dir, PathBuf::from("./audios"));
        assert_eq!(config.storage.job_log_dir, PathBuf::from("./logs/jobs"));
        assert_eq!(config.fetch_tool.binary_path, "yt-dlp");
        assert_eq!(config.queue.worker.concurrency, 2);
        assert_eq!(config.queue.retry.max_retries, 2);
        assert_eq!(config.queue.retry.retry_delay_ms, 2000);
        assert_eq!(config.progress.poll_interval_ms, 1000);
        assert_eq!(config.progress.threshold_bytes, 100 * 1024 * 1024);
        assert!(!config.summarizer.is_enabled());
        assert_eq!(config.summarizer.model, "gemini-1.5-flash");
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = load(&[
            ("PORT", "8080"),
            ("OUTPUT_DIR", "/data/audios"),
            ("LOG_DIR", "/var/log/spaces"),
            ("YT_DLP_PATH", "/usr/local/bin/yt-dlp"),
            ("DOWNLOAD_CONCURRENCY", "4"),
            ("DOWNLOAD_MAX_RETRIES", "0"),
            ("DOWNLOAD_RETRY_DELAY_MS", "10"),
            ("GOOGLE_API_KEY", "secret"),
            ("GEMINI_MODEL", "gemini-2.0-flash"),
        ]);
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.storage.output_dir, PathBuf::from("/data/audios"));
        assert_eq!(config.storage.job_log_dir, PathBuf::from("/var/log/spaces/jobs"));
        assert_eq!(config.fetch_tool.binary_path, "/usr/local/bin/yt-dlp");
        assert_eq!(config.queue.worker.concurrency, 4);
        assert_eq!(config.queue.retry, RetryPolicy::new(0, 10));
        assert!(config.summarizer.is_enabled());
        assert_eq!(config.summarizer.model, "gemini-2.0-flash");
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let config = load(&[
            ("PORT", "not-a-port"),
            ("DOWNLOAD_CONCURRENCY", "0"),
            ("DOWNLOAD_MAX_RETRIES", "-1"),
            ("GOOGLE_API_KEY", "   "),
        ]);
        assert_eq!(config.api.port, 3000);
        assert_eq!(config.queue.worker.concurrency, 2);
        assert_eq!(config.queue.retry.max_retries, 2);
        assert_eq!(config.summarizer.api_key, None);
    }

    #[test]
    fn api_key_is_never_serialized() {
        let config = load(&[("GOOGLE_API_KEY", "secret")]);
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
