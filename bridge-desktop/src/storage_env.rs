//! Storage Environment Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{StorageEnvironment, StorageEstimate},
};
use std::path::PathBuf;
use tracing::debug;

/// Filesystem-backed storage environment.
///
/// Desktop filesystems do not evict application data under pressure, so
/// persistence is always granted. Usage is computed by walking the data
/// directory; the quota is not reported (desktop quotas are the whole disk).
pub struct DesktopStorageEnvironment {
    data_dir: PathBuf,
}

impl DesktopStorageEnvironment {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    async fn directory_size(&self) -> Result<u64> {
        let mut total = 0u64;
        let mut pending = vec![self.data_dir.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(BridgeError::Io(e)),
            };

            while let Some(entry) = entries.next_entry().await.map_err(BridgeError::Io)? {
                let metadata = entry.metadata().await.map_err(BridgeError::Io)?;
                if metadata.is_dir() {
                    pending.push(entry.path());
                } else {
                    total += metadata.len();
                }
            }
        }

        Ok(total)
    }
}

#[async_trait]
impl StorageEnvironment for DesktopStorageEnvironment {
    async fn request_persistence(&self) -> Result<bool> {
        Ok(true)
    }

    async fn is_persisted(&self) -> Result<bool> {
        Ok(true)
    }

    async fn estimate(&self) -> Result<StorageEstimate> {
        let usage = self.directory_size().await?;
        debug!(usage_bytes = usage, "Computed storage usage");

        Ok(StorageEstimate {
            quota_bytes: None,
            usage_bytes: Some(usage),
        })
    }
}
