//! Download routes.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/api/download-spaces` | Download (or serve cached) audio and wait |
//! | POST | `/api/async/download-spaces` | Start a tracked download job |
//! | GET | `/api/queue-status` | Worker queue and job counters |

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::jobs::JobStats;
use crate::queue::QueueStats;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/download-spaces", post(download_spaces))
        .route("/async/download-spaces", post(start_download_job))
        .route("/queue-status", get(queue_status))
}

/// Body of both download endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    #[serde(default)]
    pub spaces_url: Option<String>,
}

impl DownloadRequest {
    fn locator(&self) -> &str {
        self.spaces_url.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub success: bool,
    pub output_path: String,
    pub filename: String,
    pub cached: bool,
}

/// Acknowledgement for a started background job.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStartedResponse {
    pub success: bool,
    pub message: String,
    pub job_id: String,
}

impl JobStartedResponse {
    pub fn new(message: &str, job_id: String) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            job_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QueueStatusResponse {
    pub success: bool,
    pub stats: QueueStats,
    pub jobs: JobStats,
}

async fn download_spaces(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> ApiResult<Json<DownloadResponse>> {
    let artifact = state
        .orchestrator
        .fetch_sync(request.locator())
        .await
        .map_err(|e| ApiError::failed("Failed to download audio", e))?;

    Ok(Json(DownloadResponse {
        success: true,
        output_path: artifact.output_path.display().to_string(),
        filename: artifact.filename,
        cached: artifact.cached,
    }))
}

async fn start_download_job(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> ApiResult<(StatusCode, Json<JobStartedResponse>)> {
    let job_id = state
        .orchestrator
        .fetch_async(request.locator())
        .await
        .map_err(|e| ApiError::failed("Failed to start download job", e))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(JobStartedResponse::new("Download job started", job_id)),
    ))
}

async fn queue_status(State(state): State<AppState>) -> Json<QueueStatusResponse> {
    let status = state.orchestrator.queue_status().await;
    Json(QueueStatusResponse {
        success: true,
        stats: status.stats,
        jobs: status.jobs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_url_deserializes_to_empty_locator() {
        let request: DownloadRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.locator(), "");

        let request: DownloadRequest =
            serde_json::from_str(r#"{"spacesUrl": "https://x.com/i/spaces/1"}"#).unwrap();
        assert_eq!(request.locator(), "https://x.com/i/spaces/1");
    }

    #[test]
    fn download_response_uses_camel_case() {
        let json = serde_json::to_value(DownloadResponse {
            success: true,
            output_path: "/tmp/a.mp3".into(),
            filename: "a.mp3".into(),
            cached: true,
        })
        .unwrap();
        assert_eq!(json["outputPath"], "/tmp/a.mp3");
        assert_eq!(json["cached"], true);
    }
}
