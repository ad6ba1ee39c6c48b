//! Audio upload and AI summarization.

mod gemini;
mod prompts;
mod traits;

use std::sync::Arc;

pub use gemini::{GeminiClient, SummarizerConfig};
pub use prompts::{DEFAULT_PROMPT, PromptCatalog};
pub use traits::{AUDIO_MIME_TYPE, FileUploader, PromptOptions, Summarizer, UploadedFile};

use crate::Result;

/// The collaborators needed by summarize operations.
#[derive(Clone)]
pub struct SummaryBackend {
    pub uploader: Arc<dyn FileUploader>,
    pub summarizer: Arc<dyn Summarizer>,
    pub prompts: PromptCatalog,
}

impl SummaryBackend {
    /// Gemini-backed services, or `None` when no API key is configured.
    pub fn gemini(config: &SummarizerConfig) -> Result<Option<Self>> {
        if !config.is_enabled() {
            return Ok(None);
        }
        let prompts = PromptCatalog::builtin();
        let client = Arc::new(GeminiClient::new(config.clone(), prompts.clone())?);
        Ok(Some(Self {
            uploader: client.clone(),
            summarizer: client,
            prompts,
        }))
    }
}
