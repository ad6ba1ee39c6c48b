//! Filesystem helpers shared across modules.
//!
//! These helpers provide consistent error context (operation + path) and
//! reduce duplicated `create_dir_all` / metadata checks.

use std::path::Path;

use crate::{Error, Result};

/// Convert an IO error into an application error with operation + path context.
pub fn io_error(op: &'static str, path: &Path, source: std::io::Error) -> Error {
    Error::io_path(op, path, source)
}

/// Ensure a directory exists, creating it (recursively) if needed.
pub async fn ensure_dir_all_with_op(op: &'static str, path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| io_error(op, path, e))
}

/// Ensure the parent directory of a file path exists with a custom operation label.
pub async fn ensure_parent_dir_with_op(op: &'static str, path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    ensure_dir_all_with_op(op, parent).await
}

/// Ensure a directory exists (synchronous variant) with a custom operation label.
pub fn ensure_dir_all_sync_with_op(op: &'static str, path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| io_error(op, path, e))
}

/// Whether a regular file exists at `path`.
pub fn is_file(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

/// Size of the file at `path`, or `None` if it does not exist (yet).
pub async fn file_size(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path).await.ok().map(|m| m.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn creates_nested_directories() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b");

        ensure_dir_all_with_op("creating output directory", &nested)
            .await
            .unwrap();
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn file_size_is_none_for_missing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.part");

        assert_eq!(file_size(&path).await, None);
        assert!(!is_file(&path));

        tokio::fs::write(&path, b"12345").await.unwrap();
        assert_eq!(file_size(&path).await, Some(5));
        assert!(is_file(&path));
    }

    #[test]
    fn directory_is_not_a_file() {
        let temp = TempDir::new().unwrap();
        assert!(!is_file(temp.path()));
    }
}
