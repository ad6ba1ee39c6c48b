//! Locator-fingerprint artifact cache.
//!
//! Artifacts live at `<output_dir>/<md5(locator)>.<ext>`. The presence of that
//! file is the only record that a locator has been fetched; there is no index.
//! Two different locators resolving to the same audio are not deduplicated.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::Result;
use crate::utils::fs;

/// Default artifact extension.
pub const DEFAULT_EXTENSION: &str = "mp3";

/// Deterministic cache key for a locator: lowercase hex MD5 of its UTF-8 bytes.
pub fn fingerprint(locator: &str) -> String {
    hex::encode(Md5::digest(locator.as_bytes()))
}

/// A fetched (or previously cached) audio file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub output_path: PathBuf,
    pub filename: String,
    pub cached: bool,
}

impl Artifact {
    pub fn new(output_path: PathBuf, cached: bool) -> Self {
        let filename = output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            output_path,
            filename,
            cached,
        }
    }
}

/// Filesystem-backed artifact cache keyed by locator fingerprint.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    output_dir: PathBuf,
    extension: String,
}

impl ArtifactCache {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self::with_extension(output_dir, DEFAULT_EXTENSION)
    }

    pub fn with_extension(output_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            extension: extension.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create the output directory if it does not exist.
    pub async fn ensure_output_dir(&self) -> Result<()> {
        fs::ensure_dir_all_with_op("creating output directory", &self.output_dir).await
    }

    /// Conventional artifact path for a locator, whether or not it exists.
    pub fn artifact_path(&self, locator: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", fingerprint(locator), self.extension))
    }

    /// Path of the cached artifact for `locator`, if one exists.
    pub fn lookup(&self, locator: &str) -> Option<PathBuf> {
        let path = self.artifact_path(locator);
        fs::is_file(&path).then_some(path)
    }
}
