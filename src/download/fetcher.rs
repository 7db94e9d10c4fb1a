//! Transport seam between the scheduler and the network.

use std::path::Path;

use async_trait::async_trait;

use super::DownloadError;

/// Fetches one remote asset into a local file.
///
/// [`HttpClient`](super::HttpClient) is the production implementation; tests
/// substitute in-memory fetchers to observe attempts without a network.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Writes the body behind `url` to `destination`, creating its parent
    /// directory when needed, and returns the number of bytes written.
    ///
    /// Implementations must not leave a partial file behind on error.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] describing why this attempt failed.
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, DownloadError>;
}
