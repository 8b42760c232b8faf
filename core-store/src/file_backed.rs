//! Filesystem-backed object store.
//!
//! Fallback backend for hosts without SQLite. Each collection maps to a
//! directory; a record is a `<key>.bin` payload beside a `<key>.meta.json`
//! sidecar. Keys are sanitized for the filesystem, with the original key kept
//! in the sidecar.

use crate::collection::Collection;
use crate::error::{Result, StoreError};
use crate::record::{unix_now, StoredRecord};
use crate::store::ObjectStore;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct RecordMeta {
    key: String,
    mime: Option<String>,
    created_at: i64,
    updated_at: i64,
}

pub struct FileBackedObjectStore {
    root: PathBuf,
}

impl FileBackedObjectStore {
    pub async fn new(root: PathBuf) -> Result<Self> {
        for collection in Collection::ALL {
            tokio::fs::create_dir_all(root.join(collection.as_str())).await?;
        }

        debug!(root = ?root, "Opened file-backed object store");

        Ok(Self { root })
    }

    fn sanitize_key(key: &str) -> String {
        key.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    fn payload_path(&self, collection: Collection, key: &str) -> PathBuf {
        self.root
            .join(collection.as_str())
            .join(format!("{}.bin", Self::sanitize_key(key)))
    }

    fn meta_path(&self, collection: Collection, key: &str) -> PathBuf {
        self.root
            .join(collection.as_str())
            .join(format!("{}.meta.json", Self::sanitize_key(key)))
    }

    async fn load_record(&self, meta_path: PathBuf) -> Result<StoredRecord> {
        let meta_bytes = tokio::fs::read(&meta_path).await?;
        let meta: RecordMeta = serde_json::from_slice(&meta_bytes)
            .map_err(|e| StoreError::Corrupt(format!("Bad record sidecar: {}", e)))?;

        let payload_path: PathBuf = meta_path
            .to_string_lossy()
            .replace(".meta.json", ".bin")
            .into();
        let payload = tokio::fs::read(&payload_path).await?;

        Ok(StoredRecord {
            key: meta.key,
            value: Bytes::from(payload),
            mime: meta.mime,
            created_at: meta.created_at,
            updated_at: meta.updated_at,
        })
    }
}

#[async_trait]
impl ObjectStore for FileBackedObjectStore {
    async fn try_put(
        &self,
        collection: Collection,
        key: &str,
        value: Bytes,
        mime: Option<String>,
    ) -> Result<()> {
        let now = unix_now();
        // Preserve created_at on overwrite by reading the old sidecar
        let created_at = match tokio::fs::read(self.meta_path(collection, key)).await {
            Ok(old) => serde_json::from_slice::<RecordMeta>(&old)
                .map(|m| m.created_at)
                .unwrap_or(now),
            Err(_) => now,
        };

        let meta = RecordMeta {
            key: key.to_string(),
            mime,
            created_at,
            updated_at: now,
        };
        let meta_bytes = serde_json::to_vec(&meta)
            .map_err(|e| StoreError::Corrupt(format!("Sidecar encode failed: {}", e)))?;

        tokio::fs::write(self.payload_path(collection, key), &value).await?;
        tokio::fs::write(self.meta_path(collection, key), meta_bytes).await?;
        Ok(())
    }

    async fn try_get(&self, collection: Collection, key: &str) -> Result<Option<StoredRecord>> {
        let meta_path = self.meta_path(collection, key);
        match tokio::fs::try_exists(&meta_path).await {
            Ok(true) => Ok(Some(self.load_record(meta_path).await?)),
            Ok(false) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn try_get_all(&self, collection: Collection) -> Result<Vec<StoredRecord>> {
        let dir = self.root.join(collection.as_str());
        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut records = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(".meta.json") {
                records.push(self.load_record(entry.path()).await?);
            }
        }

        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    async fn try_delete(&self, collection: Collection, key: &str) -> Result<()> {
        for path in [
            self.payload_path(collection, key),
            self.meta_path(collection, key),
        ] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn try_clear(&self, collection: Collection) -> Result<()> {
        let dir = self.root.join(collection.as_str());
        tokio::fs::remove_dir_all(&dir).await?;
        tokio::fs::create_dir_all(&dir).await?;
        Ok(())
    }

    async fn try_contains(&self, collection: Collection, key: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.meta_path(collection, key)).await?)
    }

    async fn count(&self, collection: Collection) -> Result<u64> {
        let dir = self.root.join(collection.as_str());
        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut n = 0u64;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().ends_with(".meta.json") {
                n += 1;
            }
        }
        Ok(n)
    }

    async fn payload_size(&self, collection: Collection) -> Result<u64> {
        let dir = self.root.join(collection.as_str());
        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut total = 0u64;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().ends_with(".bin") {
                total += entry.metadata().await?.len();
            }
        }
        Ok(total)
    }
}
