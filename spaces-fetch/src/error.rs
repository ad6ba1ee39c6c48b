//! Application-wide error types.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid state transition: cannot transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("{0}")]
    Fetch(String),

    #[error("Failed to upload file: {0}")]
    Upload(String),

    #[error("Failed to summarize audio: {0}")]
    Summarize(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Service is shutting down")]
    ShuttingDown,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error while {op} '{}': {source}", path.display())]
    IoPath {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    pub fn io_path(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::IoPath {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether repeating the same operation could succeed.
    ///
    /// Bad input and illegal state changes fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Validation(_)
                | Self::NotFound { .. }
                | Self::InvalidStateTransition { .. }
                | Self::Configuration(_)
                | Self::ServiceUnavailable(_)
                | Self::ShuttingDown
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_message_is_verbatim() {
        let err = Error::fetch("Download failed: Output file not found");
        assert_eq!(err.to_string(), "Download failed: Output file not found");
    }

    #[test]
    fn input_errors_are_not_retryable() {
        assert!(!Error::validation("Spaces URL is required").is_retryable());
        assert!(!Error::ShuttingDown.is_retryable());
        assert!(Error::fetch("exit code 1").is_retryable());
    }

    #[test]
    fn io_path_includes_operation_and_path() {
        let err = Error::io_path(
            "creating directory",
            Path::new("/tmp/audios"),
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        let msg = err.to_string();
        assert!(msg.contains("creating directory"));
        assert!(msg.contains("/tmp/audios"));
    }
}
