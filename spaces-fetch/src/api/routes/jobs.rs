//! Job routes.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/api/jobs` | List jobs without their logs |
//! | GET | `/api/jobs/{id}` | A job with its full log |
//! | GET | `/api/jobs/{id}/logs` | The job's log file as text or raw JSON lines |
//!
//! Log files outlive the in-memory registry, so `/logs` also serves jobs from
//! earlier runs of the process.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::jobs::{Job, JobSummary, render_text};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/logs", get(get_job_logs))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Raw,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub success: bool,
    pub jobs: Vec<JobSummary>,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub success: bool,
    pub job: Job,
}

async fn list_jobs(State(state): State<AppState>) -> Json<JobListResponse> {
    Json(JobListResponse {
        success: true,
        jobs: state.orchestrator.registry().list_jobs().await,
    })
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobResponse>> {
    let job = state
        .orchestrator
        .registry()
        .get_job(&id)
        .await
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    Ok(Json(JobResponse { success: true, job }))
}

async fn get_job_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Response> {
    let registry = state.orchestrator.registry();
    let store = registry.log_store();

    let not_found = || ApiError::not_found("Job not found").with_message(id.clone());

    match query.format {
        LogFormat::Raw => {
            let raw = store.read_raw(&id).await.ok_or_else(not_found)?;
            Ok(([(header::CONTENT_TYPE, "application/x-ndjson")], raw).into_response())
        }
        LogFormat::Text => {
            let entries = match registry.get_job(&id).await {
                Some(job) => job.logs,
                None => {
                    // Only the on-disk trail is left for jobs from earlier runs.
                    if store.read_raw(&id).await.is_none() {
                        return Err(not_found());
                    }
                    store.read_all(&id).await
                }
            };
            Ok((
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                render_text(&entries),
            )
                .into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_defaults_to_text() {
        let query: LogsQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.format, LogFormat::Text);
        let query: LogsQuery = serde_json::from_str(r#"{"format": "raw"}"#).unwrap();
        assert_eq!(query.format, LogFormat::Raw);
    }
}
