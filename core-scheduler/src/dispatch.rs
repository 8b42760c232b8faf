//! Seam between the schedule queue and the download engine.

use async_trait::async_trait;
use core_download::{DownloadEngine, SongInfo};

/// How a dispatch attempt failed.
#[derive(Debug, Clone)]
pub struct DispatchError {
    pub message: String,
    /// Whether retrying later may succeed without user intervention
    pub recoverable: bool,
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Executes scheduled downloads. The queue only needs to know how busy the
/// engine is and how to hand it a resolved song.
#[async_trait]
pub trait DownloadDispatcher: Send + Sync {
    /// Downloads currently owned by the engine that count against the
    /// concurrency budget.
    async fn active_download_count(&self) -> usize;

    /// Downloads and stores a song, returning the stored song id.
    async fn fetch_and_store(&self, info: &SongInfo) -> Result<String, DispatchError>;
}

#[async_trait]
impl DownloadDispatcher for DownloadEngine {
    async fn active_download_count(&self) -> usize {
        DownloadEngine::active_download_count(self).await
    }

    async fn fetch_and_store(&self, info: &SongInfo) -> Result<String, DispatchError> {
        DownloadEngine::fetch_and_store(self, info)
            .await
            .map_err(|e| DispatchError {
                message: e.to_string(),
                recoverable: e.recoverable(),
            })
    }
}
