//! In-memory job table backed by the on-disk job log store.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::log_store::JobLogStore;
use super::model::{Job, JobLogEntry, JobStats, JobStatus, JobSummary, JobUpdate, LogLevel};
use crate::{Error, Result};

/// Generate a job id of the form `job_<unix-millis>_<8 hex chars>`.
fn generate_job_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("job_{}_{}", Utc::now().timestamp_millis(), &suffix[..8])
}

fn transition_level(status: JobStatus) -> LogLevel {
    match status {
        JobStatus::Completed => LogLevel::Success,
        JobStatus::Failed => LogLevel::Error,
        _ => LogLevel::Info,
    }
}

struct JobRecord {
    job: Job,
    /// Whether `job.logs` mirrors the log file. Cleared once the job is terminal.
    logs_cached: bool,
    log_count: usize,
    last_log_at: DateTime<Utc>,
}

impl JobRecord {
    fn summary(&self) -> JobSummary {
        let job = &self.job;
        JobSummary {
            id: job.id.clone(),
            job_type: job.job_type.clone(),
            params: job.params.clone(),
            status: job.status,
            created_at: job.created_at,
            updated_at: job.updated_at,
            result: job.result.clone(),
            error: job.error.clone(),
            log_count: self.log_count,
        }
    }
}

/// Registry of all jobs known to this process.
///
/// All mutation goes through one async mutex that is held across the matching
/// log-store write, so a job's entries reach disk in the order they were produced.
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, JobRecord>>,
    store: JobLogStore,
}

impl JobRegistry {
    pub fn new(store: JobLogStore) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            store,
        }
    }

    pub fn log_store(&self) -> &JobLogStore {
        &self.store
    }

    async fn push_log(&self, record: &mut JobRecord, mut entry: JobLogEntry) {
        if entry.timestamp < record.last_log_at {
            entry.timestamp = record.last_log_at;
        }
        record.last_log_at = entry.timestamp;

        self.store.append(&record.job.id, &entry).await;
        record.log_count += 1;
        if record.logs_cached {
            record.job.logs.push(entry);
        }
    }

    /// Create a job in the `queued` state and initialise its log.
    pub async fn create_job(&self, job_type: &str, params: serde_json::Value) -> String {
        let mut jobs = self.jobs.lock().await;

        let mut id = generate_job_id();
        while jobs.contains_key(&id) {
            id = generate_job_id();
        }

        let now = Utc::now();
        let mut record = JobRecord {
            job: Job {
                id: id.clone(),
                job_type: job_type.to_string(),
                params: params.clone(),
                status: JobStatus::Queued,
                created_at: now,
                updated_at: now,
                result: None,
                error: None,
                logs: Vec::new(),
            },
            logs_cached: true,
            log_count: 0,
            last_log_at: now,
        };

        self.store.init(&id, now).await;
        self.push_log(
            &mut record,
            JobLogEntry::info(format!("Job created: {job_type}")).with_data(params),
        )
        .await;

        jobs.insert(id.clone(), record);
        info!(job_id = %id, job_type = %job_type, "Created job");
        id
    }

    /// Snapshot of a job, with logs loaded from disk when not cached in memory.
    pub async fn get_job(&self, job_id: &str) -> Option<Job> {
        let (mut job, cached) = {
            let jobs = self.jobs.lock().await;
            let record = jobs.get(job_id)?;
            (record.job.clone(), record.logs_cached)
        };

        if !cached {
            job.logs = self.store.read_all(job_id).await;
        }
        Some(job)
    }

    /// Move a job to `status`, optionally recording a result or error.
    ///
    /// Returns `Ok(false)` when the job is unknown. Transitions that the state
    /// machine forbids, including any move out of a terminal state, are rejected
    /// and leave the job untouched. A result may only accompany `completed` and
    /// an error only `failed`.
    pub async fn update_job(
        &self,
        job_id: &str,
        status: JobStatus,
        update: JobUpdate,
    ) -> Result<bool> {
        let mut jobs = self.jobs.lock().await;
        let Some(record) = jobs.get_mut(job_id) else {
            debug!(job_id = %job_id, "Ignoring update for unknown job");
            return Ok(false);
        };

        let from = record.job.status;
        let to = from.transition_to(status).inspect_err(|e| {
            warn!(job_id = %job_id, error = %e, "Rejected job state transition");
        })?;

        if update.result.is_some() && to != JobStatus::Completed {
            return Err(Error::validation(format!(
                "a result can only be recorded on completion, not on '{to}'"
            )));
        }
        if update.error.is_some() && to != JobStatus::Failed {
            return Err(Error::validation(format!(
                "an error can only be recorded on failure, not on '{to}'"
            )));
        }

        let now = Utc::now();
        record.job.status = to;
        record.job.updated_at = now.max(record.job.created_at);

        self.push_log(
            record,
            JobLogEntry::new(
                transition_level(to),
                format!("Status changed: {from} -> {to}"),
            ),
        )
        .await;

        if let Some(result) = update.result {
            record.job.result = Some(result.clone());
            self.push_log(record, JobLogEntry::success("Result recorded").with_data(result))
                .await;
        }
        if let Some(error) = update.error {
            self.push_log(record, JobLogEntry::error(format!("Error: {error}")))
                .await;
            record.job.error = Some(error);
        }

        if to.is_terminal() {
            // History stays on disk; drop the in-memory copy.
            record.logs_cached = false;
            record.job.logs = Vec::new();
        }

        info!(job_id = %job_id, from = %from, to = %to, "Job status updated");
        Ok(true)
    }

    /// Append a log entry without changing the job status.
    ///
    /// Returns `false` when the job is unknown.
    pub async fn add_log(
        &self,
        job_id: &str,
        message: impl Into<String>,
        level: LogLevel,
        data: Option<serde_json::Value>,
    ) -> bool {
        let mut jobs = self.jobs.lock().await;
        let Some(record) = jobs.get_mut(job_id) else {
            return false;
        };

        let mut entry = JobLogEntry::new(level, message);
        entry.data = data;
        self.push_log(record, entry).await;
        true
    }

    /// All jobs without log bodies, oldest first.
    pub async fn list_jobs(&self) -> Vec<JobSummary> {
        let jobs = self.jobs.lock().await;
        let mut summaries: Vec<JobSummary> = jobs.values().map(JobRecord::summary).collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        summaries
    }

    /// Current status of a job.
    pub async fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.lock().await.get(job_id).map(|r| r.job.status)
    }

    /// Job counts per status.
    pub async fn stats(&self) -> JobStats {
        let jobs = self.jobs.lock().await;
        let mut stats = JobStats::default();
        for record in jobs.values() {
            stats.record(record.job.status);
        }
        stats
    }
}
