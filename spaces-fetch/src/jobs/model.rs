//! Job records, log entries and the job state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Lifecycle states of a job.
///
/// ```text
/// queued -> processing -> downloading -> uploading -> summarizing -> completed
/// ```
///
/// Besides the chain, three shortcuts exist for cached audio: `queued ->
/// completed`, `processing -> completed` and `processing -> uploading`, plus
/// `downloading -> completed` when a download job ends after its fetch. Any
/// non-terminal state may drop to [`JobStatus::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Downloading,
    Uploading,
    Summarizing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 7] = [
        Self::Queued,
        Self::Processing,
        Self::Downloading,
        Self::Uploading,
        Self::Summarizing,
        Self::Completed,
        Self::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Downloading => "downloading",
            Self::Uploading => "uploading",
            Self::Summarizing => "summarizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// `completed` and `failed` are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Validate a state transition.
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        use JobStatus::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, target),
            (_, Failed)
                | (Queued, Processing | Completed)
                | (Processing, Downloading | Uploading | Completed)
                | (Downloading, Uploading | Completed)
                | (Uploading, Summarizing)
                | (Summarizing, Completed)
        )
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&self, target: JobStatus) -> Result<JobStatus, Error> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(Error::InvalidStateTransition {
                from: self.as_str().to_string(),
                to: target.as_str().to_string(),
            })
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Log level for job audit entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Success,
    Error,
    Progress,
}

impl LogLevel {
    pub fn as_upper(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Success => "SUCCESS",
            Self::Error => "ERROR",
            Self::Progress => "PROGRESS",
        }
    }
}

/// A single line of a job's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JobLogEntry {
    /// Create a new log entry with the current timestamp.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            data: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }

    pub fn progress(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Progress, message)
    }

    /// Attach structured data.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Optional payload of an [`update_job`](super::JobRegistry::update_job) call.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl JobUpdate {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn result(result: serde_json::Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(error.into()),
        }
    }
}

/// A trackable unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub params: serde_json::Value,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub logs: Vec<JobLogEntry>,
}

/// A job without its log body, for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub params: serde_json::Value,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub log_count: usize,
}

/// Job counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub total: usize,
    pub queued: usize,
    pub processing: usize,
    pub downloading: usize,
    pub uploading: usize,
    pub summarizing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl JobStats {
    pub fn record(&mut self, status: JobStatus) {
        self.total += 1;
        let slot = match status {
            JobStatus::Queued => &mut self.queued,
            JobStatus::Processing => &mut self.processing,
            JobStatus::Downloading => &mut self.downloading,
            JobStatus::Uploading => &mut self.uploading,
            JobStatus::Summarizing => &mut self.summarizing,
            JobStatus::Completed => &mut self.completed,
            JobStatus::Failed => &mut self.failed,
        };
        *slot += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use JobStatus::*;

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(Queued.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Downloading));
        assert!(Downloading.can_transition_to(Uploading));
        assert!(Uploading.can_transition_to(Summarizing));
        assert!(Summarizing.can_transition_to(Completed));
        // Cached audio shortcuts
        assert!(Queued.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Uploading));
        assert!(Downloading.can_transition_to(Completed));
    }

    #[test]
    fn stages_cannot_be_skipped_outside_the_shortcuts() {
        assert!(!Queued.can_transition_to(Downloading));
        assert!(!Queued.can_transition_to(Uploading));
        assert!(!Queued.can_transition_to(Summarizing));
        assert!(!Processing.can_transition_to(Summarizing));
        assert!(!Downloading.can_transition_to(Summarizing));
        assert!(!Uploading.can_transition_to(Completed));
        let err = Queued.transition_to(Summarizing).unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
    }

    #[test]
    fn any_non_terminal_state_can_fail() {
        for status in [Queued, Processing, Downloading, Uploading, Summarizing] {
            assert!(status.can_transition_to(Failed), "{status} -> failed");
        }
    }

    #[test]
    fn backward_and_self_transitions_are_rejected() {
        assert!(!Downloading.can_transition_to(Processing));
        assert!(!Summarizing.can_transition_to(Queued));
        assert!(!Processing.can_transition_to(Processing));
    }

    #[test]
    fn terminal_states_never_transition() {
        for target in JobStatus::ALL {
            assert!(!Completed.can_transition_to(target));
            assert!(!Failed.can_transition_to(target));
        }
        let err = Completed.transition_to(Failed).unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
    }

    #[test]
    fn status_string_round_trip() {
        for status in JobStatus::ALL {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::parse("pending"), None);
    }

    #[test]
    fn job_serializes_with_api_field_names() {
        let now = Utc::now();
        let job = Job {
            id: "job_1_abcd1234".to_string(),
            job_type: "download".to_string(),
            params: serde_json::json!({"spacesUrl": "https://x.com/i/spaces/1"}),
            status: Processing,
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
            logs: vec![],
        };
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["type"], "download");
        assert_eq!(json["status"], "processing");
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn stats_count_each_status() {
        let mut stats = JobStats::default();
        stats.record(Queued);
        stats.record(Completed);
        stats.record(Completed);
        stats.record(Failed);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.queued, 1);
    }
}
