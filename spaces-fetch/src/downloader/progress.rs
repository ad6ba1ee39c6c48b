//! Size-based progress monitoring of an in-flight fetch.
//!
//! The fetch tool gives no reliable machine-readable progress, so the monitor
//! polls the size of the file being written and reports each time it crosses
//! the next multiple of a byte threshold.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, trace};

use crate::utils::fs;

const MIB: u64 = 1024 * 1024;

/// Progress polling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Report every time the file grows past another multiple of this many
    /// bytes. Zero disables reporting.
    #[serde(default = "default_threshold_bytes")]
    pub threshold_bytes: u64,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_threshold_bytes() -> u64 {
    100 * MIB
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            threshold_bytes: default_threshold_bytes(),
        }
    }
}

impl ProgressConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Receives progress reports.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn on_progress(&self, bytes: u64);
}

/// Human readable progress message, e.g. `Downloaded 200 MB`.
pub fn describe_progress(bytes: u64) -> String {
    format!("Downloaded {} MB", bytes / MIB)
}

/// Partial-output path the fetch tool writes while running.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Background poller for one fetch attempt.
///
/// Dropping the monitor cancels the poller; [`ProgressMonitor::stop`] also
/// waits for it to exit.
pub struct ProgressMonitor {
    handle: JoinHandle<()>,
    token: CancellationToken,
    _guard: DropGuard,
}

impl ProgressMonitor {
    pub fn start(dest: &Path, config: &ProgressConfig, sink: Arc<dyn ProgressSink>) -> Self {
        let token = CancellationToken::new();
        let handle = tokio::spawn(poll(
            dest.to_path_buf(),
            config.poll_interval(),
            config.threshold_bytes,
            sink,
            token.clone(),
        ));

        Self {
            handle,
            _guard: token.clone().drop_guard(),
            token,
        }
    }

    /// Cancel the poller and wait for it to finish.
    pub async fn stop(self) {
        self.token.cancel();
        let Self { handle, .. } = self;
        if let Err(e) = handle.await {
            debug!(error = %e, "Progress poller ended abnormally");
        }
    }
}

async fn current_size(dest: &Path, partial: &Path) -> Option<u64> {
    match fs::file_size(partial).await {
        Some(size) => Some(size),
        None => fs::file_size(dest).await,
    }
}

async fn poll(
    dest: PathBuf,
    interval: Duration,
    threshold: u64,
    sink: Arc<dyn ProgressSink>,
    token: CancellationToken,
) {
    if threshold == 0 {
        return;
    }

    let partial = partial_path(&dest);
    let mut next_report = threshold;
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(size) = current_size(&dest, &partial).await else {
            continue;
        };
        trace!(dest = %dest.display(), size, "Polled fetch output size");

        if size >= next_report {
            sink.on_progress(size).await;
            next_report = (size / threshold).saturating_add(1).saturating_mul(threshold);
        }
    }
}
