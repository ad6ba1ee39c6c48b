//! Upload and summarization interfaces.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::Result;

/// MIME type used for Spaces audio.
pub const AUDIO_MIME_TYPE: &str = "audio/mp3";

/// A file held by the summarization service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub uri: String,
    pub mime_type: String,
    pub file_name: String,
    /// Local file the upload came from. Unknown for files referenced by URI only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_path: Option<PathBuf>,
}

impl UploadedFile {
    /// Reference an already uploaded file by URI.
    pub fn from_uri(uri: impl Into<String>, mime_type: Option<String>) -> Self {
        let uri = uri.into();
        let file_name = uri.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            uri,
            mime_type: mime_type.unwrap_or_else(|| AUDIO_MIME_TYPE.to_string()),
            file_name,
            original_path: None,
        }
    }
}

/// Prompt selection for a summarization request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
    /// Model override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[async_trait]
pub trait FileUploader: Send + Sync {
    /// Upload a local file. Fails if the file does not exist.
    async fn upload(&self, path: &Path) -> Result<UploadedFile>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, file: &UploadedFile, options: &PromptOptions) -> Result<String>;
}
