//! Append-only, per-job audit log on disk.
//!
//! Each job gets `<log_dir>/<job_id>.jsonl`: one header record followed by one
//! JSON object per log entry. Writes are best-effort; a failed write is traced
//! and never surfaces to the caller.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::model::JobLogEntry;
use crate::utils::fs;
use crate::utils::json::{self, JsonContext};

/// Log file extension.
const LOG_EXTENSION: &str = "jsonl";

/// One line of a job log file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "lowercase")]
enum LogRecord {
    Header {
        job_id: String,
        created_at: DateTime<Utc>,
    },
    Entry(JobLogEntry),
}

/// Directory-backed store of job log files.
#[derive(Debug, Clone)]
pub struct JobLogStore {
    log_dir: PathBuf,
}

impl JobLogStore {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Deterministic log file location for a job, or `None` when the id could
    /// name a file outside the log directory.
    pub fn path(&self, job_id: &str) -> Option<PathBuf> {
        if !is_safe_job_id(job_id) {
            debug!(job_id = %job_id, "Rejecting unsafe job id");
            return None;
        }
        Some(self.log_dir.join(format!("{job_id}.{LOG_EXTENSION}")))
    }

    /// Create the log file for a new job, writing the header record.
    pub async fn init(&self, job_id: &str, created_at: DateTime<Utc>) {
        let Some(path) = self.path(job_id) else {
            warn!(job_id = %job_id, "Not creating job log for unsafe job id");
            return;
        };
        let header = LogRecord::Header {
            job_id: job_id.to_string(),
            created_at,
        };
        let line = encode_line(job_id, &header);

        if let Err(e) = fs::ensure_parent_dir_with_op("creating job log directory", &path).await {
            warn!(job_id = %job_id, error = %e, "Failed to create job log directory");
            return;
        }

        match tokio::fs::write(&path, line).await {
            Ok(()) => debug!(job_id = %job_id, path = %path.display(), "Initialized job log"),
            Err(e) => {
                warn!(job_id = %job_id, path = %path.display(), error = %e, "Failed to initialize job log")
            }
        }
    }

    /// Append one entry to a job's log.
    pub async fn append(&self, job_id: &str, entry: &JobLogEntry) {
        let Some(path) = self.path(job_id) else {
            warn!(job_id = %job_id, "Dropping log entry for unsafe job id");
            return;
        };
        let line = encode_line(job_id, &LogRecord::Entry(entry.clone()));

        let result = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = result {
            warn!(job_id = %job_id, path = %path.display(), error = %e, "Failed to append job log entry");
        }
    }

    /// Parse all entries of a job's log, skipping the header and malformed lines.
    pub async fn read_all(&self, job_id: &str) -> Vec<JobLogEntry> {
        let Some(raw) = self.read_raw(job_id).await else {
            return Vec::new();
        };
        parse_entries(job_id, &raw)
    }

    /// The log file verbatim, or `None` if it does not exist.
    pub async fn read_raw(&self, job_id: &str) -> Option<String> {
        let path = self.path(job_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Some(raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(job_id = %job_id, path = %path.display(), error = %e, "Failed to read job log");
                None
            }
        }
    }
}

/// Job ids are single file-name components: ASCII letters, digits, `_` and `-`.
fn is_safe_job_id(job_id: &str) -> bool {
    !job_id.is_empty()
        && job_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn encode_line(job_id: &str, record: &LogRecord) -> String {
    let mut line = json::to_string_or_fallback(
        record,
        r#"{"record":"entry","timestamp":"1970-01-01T00:00:00Z","level":"error","message":"log serialize failed"}"#,
        JsonContext::JobField {
            job_id,
            field: "log_record",
        },
        "Failed to serialize job log record; using fallback",
    );
    line.push('\n');
    line
}

fn parse_entries(job_id: &str, raw: &str) -> Vec<JobLogEntry> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(idx, line)| {
            json::parse_or_warn::<LogRecord>(
                line,
                JsonContext::JobLogLine {
                    job_id,
                    line: idx + 1,
                },
                "Skipping malformed job log line",
            )
        })
        .filter_map(|record| match record {
            LogRecord::Entry(entry) => Some(entry),
            LogRecord::Header { .. } => None,
        })
        .collect()
}

/// Render entries as `[<local-time>] [<LEVEL>] <message>` lines, each optionally
/// followed by an indented `Data: <json>` line.
pub fn render_text(entries: &[JobLogEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let local = entry.timestamp.with_timezone(&Local);
        let _ = writeln!(
            out,
            "[{}] [{}] {}",
            local.format("%Y-%m-%d %H:%M:%S%.3f"),
            entry.level.as_upper(),
            entry.message
        );
        if let Some(data) = &entry.data {
            let _ = writeln!(out, "    Data: {data}");
        }
    }
    out
}
