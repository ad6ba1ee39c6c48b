//! Summarization routes.
//!
//! All of these answer 503 when no summarization backend is configured.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::downloads::JobStartedResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::summarize::{PromptOptions, UploadedFile};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/summarize-spaces", post(summarize_spaces))
        .route("/async/summarize-spaces", post(start_summarize_job))
        .route("/upload-audio", post(upload_audio))
        .route("/summarize-uploaded", post(summarize_uploaded))
        .route("/prompts", get(list_prompts))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    #[serde(default)]
    pub spaces_url: Option<String>,
    #[serde(default)]
    pub prompt_type: Option<String>,
    #[serde(default)]
    pub custom_prompt: Option<String>,
}

impl SummarizeRequest {
    fn into_parts(self) -> (String, PromptOptions) {
        let options = PromptOptions {
            prompt_type: non_empty(self.prompt_type),
            custom_prompt: non_empty(self.custom_prompt),
            model: None,
        };
        (self.spaces_url.unwrap_or_default(), options)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    #[serde(default)]
    pub file_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeUploadedRequest {
    #[serde(default)]
    pub file_uri: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub prompt_type: Option<String>,
    #[serde(default)]
    pub custom_prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AudioFileInfo {
    pub path: String,
    pub filename: String,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeResponse {
    pub success: bool,
    pub summary: String,
    pub audio_file: AudioFileInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFileInfo {
    pub uri: String,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
}

impl From<UploadedFile> for UploadedFileInfo {
    fn from(file: UploadedFile) -> Self {
        Self {
            uri: file.uri,
            file_name: file.file_name,
            original_path: file.original_path.map(|p| p.display().to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub uploaded_file: UploadedFileInfo,
}

#[derive(Debug, Serialize)]
pub struct SummaryTextResponse {
    pub success: bool,
    pub summary: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptsResponse {
    pub success: bool,
    pub available_prompts: BTreeMap<String, String>,
}

async fn summarize_spaces(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> ApiResult<Json<SummarizeResponse>> {
    let (locator, options) = request.into_parts();
    let outcome = state
        .orchestrator
        .summarize_sync(&locator, &options)
        .await
        .map_err(|e| ApiError::failed("Failed to summarize audio", e))?;

    Ok(Json(SummarizeResponse {
        success: true,
        summary: outcome.summary,
        audio_file: AudioFileInfo {
            path: outcome.audio_file.output_path.display().to_string(),
            filename: outcome.audio_file.filename,
            cached: outcome.audio_file.cached,
        },
    }))
}

async fn start_summarize_job(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> ApiResult<(StatusCode, Json<JobStartedResponse>)> {
    let (locator, options) = request.into_parts();
    let job_id = state
        .orchestrator
        .summarize_async(&locator, options)
        .await
        .map_err(|e| ApiError::failed("Failed to start summarization job", e))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(JobStartedResponse::new("Summarization job started", job_id)),
    ))
}

async fn upload_audio(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> ApiResult<Json<UploadResponse>> {
    if !state.orchestrator.summarization_enabled() {
        return Err(ApiError::service_unavailable("Upload service unavailable")
            .with_message("Google API Key not configured"));
    }
    let Some(file_path) = non_empty(request.file_path) else {
        return Err(ApiError::bad_request("File path is required"));
    };

    let uploaded = state
        .orchestrator
        .upload(&PathBuf::from(file_path))
        .await
        .map_err(|e| ApiError::failed("Failed to upload file", e))?;

    Ok(Json(UploadResponse {
        success: true,
        uploaded_file: uploaded.into(),
    }))
}

async fn summarize_uploaded(
    State(state): State<AppState>,
    Json(request): Json<SummarizeUploadedRequest>,
) -> ApiResult<Json<SummaryTextResponse>> {
    if !state.orchestrator.summarization_enabled() {
        return Err(ApiError::service_unavailable("Summarization service unavailable")
            .with_message("Google API Key not configured"));
    }
    let Some(file_uri) = non_empty(request.file_uri) else {
        return Err(ApiError::bad_request("File URI is required"));
    };

    let file = UploadedFile::from_uri(file_uri, non_empty(request.mime_type));
    let options = PromptOptions {
        prompt_type: non_empty(request.prompt_type),
        custom_prompt: non_empty(request.custom_prompt),
        model: None,
    };
    let summary = state
        .orchestrator
        .summarize_uploaded(&file, &options)
        .await
        .map_err(|e| ApiError::failed("Failed to summarize file", e))?;

    Ok(Json(SummaryTextResponse {
        success: true,
        summary,
    }))
}

async fn list_prompts(State(state): State<AppState>) -> ApiResult<Json<PromptsResponse>> {
    let available_prompts = state
        .orchestrator
        .prompts()
        .map_err(|e| ApiError::failed("Failed to fetch prompts", e))?;

    Ok(Json(PromptsResponse {
        success: true,
        available_prompts,
    }))
}
