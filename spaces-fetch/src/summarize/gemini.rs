//! Google Generative Language REST client.
//!
//! Uploads audio through the resumable Files API, waits until the file has
//! been processed and asks the configured model to summarize it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use super::prompts::PromptCatalog;
use super::traits::{AUDIO_MIME_TYPE, FileUploader, PromptOptions, Summarizer, UploadedFile};
use crate::utils::fs;
use crate::{Error, Result};

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";
const DISPLAY_NAME: &str = "Spaces audio";

/// Summarization service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Summarization is disabled without a key.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Delay between checks while an upload is being processed.
    pub processing_poll_interval_ms: u64,
    /// Give up waiting for processing after this long.
    pub processing_timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            processing_poll_interval_ms: 10_000,
            processing_timeout_secs: 3600,
        }
    }
}

impl SummarizerConfig {
    pub fn is_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct FileEnvelope {
    file: RemoteFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteFile {
    name: String,
    uri: String,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    fn text(&self) -> Option<String> {
        let text: String = self
            .candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

async fn ensure_success(
    response: reqwest::Response,
    to_error: fn(String) -> Error,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(to_error(format!("HTTP {status}: {body}")))
}

/// Gemini-backed uploader and summarizer.
pub struct GeminiClient {
    client: reqwest::Client,
    config: SummarizerConfig,
    api_key: String,
    prompts: PromptCatalog,
}

impl GeminiClient {
    pub fn new(config: SummarizerConfig, prompts: PromptCatalog) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Other(format!("Failed to build reqwest client: {}", e)))?;
        Self::with_http_client(config, prompts, client)
    }

    pub fn with_http_client(
        config: SummarizerConfig,
        prompts: PromptCatalog,
        client: reqwest::Client,
    ) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::ServiceUnavailable("Google API Key not configured".to_string())
            })?;

        Ok(Self {
            client,
            config,
            api_key,
            prompts,
        })
    }

    pub fn prompts(&self) -> &PromptCatalog {
        &self.prompts
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn start_upload(&self, size: u64) -> Result<String> {
        let response = self
            .client
            .post(self.url("upload/v1beta/files"))
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", size)
            .header("X-Goog-Upload-Header-Content-Type", AUDIO_MIME_TYPE)
            .json(&serde_json::json!({ "file": { "display_name": DISPLAY_NAME } }))
            .send()
            .await?;
        let response = ensure_success(response, Error::Upload).await?;

        response
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::Upload("upload session URL missing from response".to_string()))
    }

    async fn send_bytes(&self, upload_url: &str, path: &Path, size: u64) -> Result<RemoteFile> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| fs::io_error("opening audio file", path, e))?;

        let response = self
            .client
            .post(upload_url)
            .header(reqwest::header::CONTENT_LENGTH, size)
            .header("X-Goog-Upload-Offset", 0)
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await?;
        let response = ensure_success(response, Error::Upload).await?;
        Ok(response.json::<FileEnvelope>().await?.file)
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile> {
        let response = self
            .client
            .get(self.url(&format!("v1beta/{name}")))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        let response = ensure_success(response, Error::Upload).await?;
        Ok(response.json::<RemoteFile>().await?)
    }

    /// Poll until the uploaded file leaves the `PROCESSING` state.
    async fn wait_until_processed(&self, mut file: RemoteFile) -> Result<RemoteFile> {
        let started = Instant::now();
        let timeout = Duration::from_secs(self.config.processing_timeout_secs);
        let interval = Duration::from_millis(self.config.processing_poll_interval_ms);

        loop {
            match file.state.as_deref() {
                Some("PROCESSING") => {
                    if started.elapsed() >= timeout {
                        return Err(Error::Upload(format!(
                            "timed out waiting for {} to be processed",
                            file.name
                        )));
                    }
                    debug!(file = %file.name, "Waiting for uploaded audio to be processed");
                    tokio::time::sleep(interval).await;
                    file = self.get_file(&file.name).await?;
                }
                Some("FAILED") => return Err(Error::Upload("Audio processing failed.".to_string())),
                _ => return Ok(file),
            }
        }
    }
}

#[async_trait]
impl FileUploader for GeminiClient {
    async fn upload(&self, path: &Path) -> Result<UploadedFile> {
        let size = fs::file_size(path)
            .await
            .filter(|_| fs::is_file(path))
            .ok_or_else(|| Error::not_found("audio file", path.display().to_string()))?;

        info!(path = %path.display(), size, "Uploading audio file");
        let upload_url = self.start_upload(size).await?;
        let remote = self.send_bytes(&upload_url, path, size).await?;
        let remote = self.wait_until_processed(remote).await?;
        info!(path = %path.display(), uri = %remote.uri, "Audio file uploaded");

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(UploadedFile {
            uri: remote.uri,
            mime_type: AUDIO_MIME_TYPE.to_string(),
            file_name,
            original_path: Some(path.to_path_buf()),
        })
    }
}

#[async_trait]
impl Summarizer for GeminiClient {
    async fn summarize(&self, file: &UploadedFile, options: &PromptOptions) -> Result<String> {
        let model = options.model.as_deref().unwrap_or(&self.config.model);
        let prompt = self.prompts.select(options);
        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": prompt },
                    { "file_data": { "mime_type": file.mime_type, "file_uri": file.uri } },
                ],
            }],
        });

        info!(uri = %file.uri, model = %model, "Generating summary");
        let response = self
            .client
            .post(self.url(&format!("v1beta/models/{model}:generateContent")))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response, Error::Summarize).await?;
        let parsed: GenerateResponse = response.json().await?;

        parsed
            .text()
            .ok_or_else(|| Error::Summarize("model returned no text".to_string()))
    }
}
