//! yt-dlp subprocess fetch tool.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::Path;
use tokio::io::AsyncRead;
use tracing::{debug, info, trace, warn};

use super::output_record_reader::OutputRecordReader;
use super::traits::FetchTool;
use crate::utils::fs;
use crate::{Error, Result};

/// Configuration for the external fetch tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchToolConfig {
    /// Executable name or path.
    pub binary_path: String,
    /// Arguments placed before the locator arguments.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for FetchToolConfig {
    fn default() -> Self {
        Self {
            binary_path: "yt-dlp".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Whether a stderr record reports a fatal problem.
fn is_fatal_line(line: &str) -> bool {
    line.starts_with("ERROR") || line.to_ascii_lowercase().contains("error:")
}

fn is_progress_line(line: &str) -> bool {
    line.starts_with("[download]") && line.contains('%')
}

/// Runs `yt-dlp -i -o <dest> -- <locator>`.
#[derive(Debug, Clone)]
pub struct YtDlpTool {
    config: FetchToolConfig,
}

impl YtDlpTool {
    pub fn new(config: FetchToolConfig) -> Self {
        Self { config }
    }

    fn build_args(&self, locator: &str, dest: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.config.extra_args.iter().map(OsString::from).collect();
        args.push("-i".into());
        args.push("-o".into());
        args.push(dest.as_os_str().to_owned());
        // Everything after `--` is a URL, never an option.
        args.push("--".into());
        args.push(locator.into());
        args
    }
}

async fn drain_stdout<R: AsyncRead + Unpin>(stdout: R, locator: String) {
    let mut reader = OutputRecordReader::new(stdout);
    loop {
        match reader.next_record().await {
            Ok(Some(line)) if is_progress_line(&line) => {
                trace!(locator = %locator, "{line}");
            }
            Ok(Some(line)) => debug!(locator = %locator, "yt-dlp: {line}"),
            Ok(None) => break,
            Err(e) => {
                warn!(locator = %locator, error = %e, "Error reading yt-dlp stdout");
                break;
            }
        }
    }
}

/// Drain stderr, returning the last fatal-looking record.
async fn collect_stderr<R: AsyncRead + Unpin>(stderr: R, locator: String) -> Option<String> {
    let mut reader = OutputRecordReader::new(stderr);
    let mut last_fatal = None;
    loop {
        match reader.next_record().await {
            Ok(Some(line)) if is_fatal_line(&line) => {
                warn!(locator = %locator, "yt-dlp error: {line}");
                last_fatal = Some(line);
            }
            Ok(Some(line)) => debug!(locator = %locator, "yt-dlp stderr: {line}"),
            Ok(None) => break,
            Err(e) => {
                warn!(locator = %locator, error = %e, "Error reading yt-dlp stderr");
                break;
            }
        }
    }
    last_fatal
}

#[async_trait]
impl FetchTool for YtDlpTool {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn fetch(&self, locator: &str, dest: &Path) -> Result<()> {
        fs::ensure_parent_dir_with_op("creating output directory", dest).await?;

        let binary = &self.config.binary_path;
        info!(locator = %locator, dest = %dest.display(), "Executing {binary}");

        let mut child = process_utils::piped_command(binary)
            .args(self.build_args(locator, dest))
            .spawn()
            .map_err(|e| Error::fetch(format!("Failed to start {binary}: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Other(format!("Failed to capture {binary} stdout")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Other(format!("Failed to capture {binary} stderr")))?;

        let stdout_task = tokio::spawn(drain_stdout(stdout, locator.to_string()));
        let stderr_task = tokio::spawn(collect_stderr(stderr, locator.to_string()));

        let status = child
            .wait()
            .await
            .map_err(|e| Error::fetch(format!("Failed to wait for {binary}: {e}")))?;

        let _ = stdout_task.await;
        let last_error = stderr_task.await.ok().flatten();

        if !status.success() {
            let exit = process_utils::describe_exit(&status);
            let message = match last_error {
                Some(detail) => format!("Command failed: {binary} ({exit}): {detail}"),
                None => format!("Command failed: {binary} ({exit})"),
            };
            warn!(locator = %locator, "{message}");
            return Err(Error::fetch(message));
        }

        if !fs::is_file(dest) {
            warn!(locator = %locator, dest = %dest.display(), "{binary} exited successfully but produced no file");
            return Err(Error::fetch("Download failed: Output file not found"));
        }

        info!(locator = %locator, dest = %dest.display(), "Download completed");
        Ok(())
    }
}
