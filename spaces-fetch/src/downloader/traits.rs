//! Fetch tool abstraction.

use async_trait::async_trait;
use std::path::Path;

use crate::Result;

/// External tool that retrieves the audio behind a locator into a file.
///
/// Success means the tool reported success *and* `dest` exists afterwards.
/// Implementations may write a partial file at `<dest>.part` while running.
#[async_trait]
pub trait FetchTool: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, locator: &str, dest: &Path) -> Result<()>;
}
