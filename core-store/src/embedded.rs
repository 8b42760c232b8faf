//! SQLite-backed object store.
//!
//! The primary backend. One table per collection, created at open time with
//! inline DDL. Every operation is wrapped in a timeout so a wedged backend
//! surfaces as [`StoreError::Timeout`] instead of hanging callers: writes get
//! five seconds, reads three.

use crate::collection::Collection;
use crate::error::{Result, StoreError};
use crate::record::{unix_now, StoredRecord};
use crate::store::ObjectStore;
use async_trait::async_trait;
use bytes::Bytes;
use sqlx::{sqlite::SqlitePool, Row};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Tuning for the embedded store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub write_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(3),
        }
    }
}

impl StoreConfig {
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

pub struct EmbeddedObjectStore {
    pool: SqlitePool,
    config: StoreConfig,
}

impl EmbeddedObjectStore {
    /// Opens (creating if needed) the store at the given database path.
    pub async fn new(db_path: PathBuf, config: StoreConfig) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // SQLite URLs want forward slashes even on Windows
        let path_str = db_path.to_string_lossy().replace('\\', "/");
        let db_url = format!("sqlite://{}?mode=rwc", path_str);

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to connect to DB: {}", e)))?;

        Self::create_schema(&pool).await?;

        debug!(path = ?db_path, "Opened embedded object store");

        Ok(Self { pool, config })
    }

    /// Creates an in-memory store (for testing).
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to connect to DB: {}", e)))?;

        Self::create_schema(&pool).await?;

        Ok(Self {
            pool,
            config: StoreConfig::default(),
        })
    }

    /// Replaces the timeout configuration.
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    async fn create_schema(pool: &SqlitePool) -> Result<()> {
        for collection in Collection::ALL {
            let ddl = format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    key TEXT PRIMARY KEY,
                    value BLOB NOT NULL,
                    mime TEXT,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                )
                "#,
                collection.table_name()
            );

            sqlx::query(&ddl)
                .execute(pool)
                .await
                .map_err(|e| StoreError::Backend(format!("Failed to create table: {}", e)))?;
        }

        Ok(())
    }

    async fn timed<T, F>(&self, timeout: Duration, op: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout { op: op.to_string() })?
    }

    fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> StoredRecord {
        let value: Vec<u8> = row.get("value");
        StoredRecord {
            key: row.get("key"),
            value: Bytes::from(value),
            mime: row.get("mime"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl ObjectStore for EmbeddedObjectStore {
    async fn try_put(
        &self,
        collection: Collection,
        key: &str,
        value: Bytes,
        mime: Option<String>,
    ) -> Result<()> {
        let sql = format!(
            r#"
            INSERT INTO {} (key, value, mime, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                mime = excluded.mime,
                updated_at = excluded.updated_at
            "#,
            collection.table_name()
        );
        let now = unix_now();

        self.timed(self.config.write_timeout, "put", async {
            sqlx::query(&sql)
                .bind(key)
                .bind(value.as_ref())
                .bind(&mime)
                .bind(now)
                .bind(now)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(format!("Failed to put record: {}", e)))?;
            Ok(())
        })
        .await
    }

    async fn try_get(&self, collection: Collection, key: &str) -> Result<Option<StoredRecord>> {
        let sql = format!(
            "SELECT key, value, mime, created_at, updated_at FROM {} WHERE key = ?",
            collection.table_name()
        );

        self.timed(self.config.read_timeout, "get", async {
            let row = sqlx::query(&sql)
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(format!("Failed to get record: {}", e)))?;

            Ok(row.as_ref().map(Self::record_from_row))
        })
        .await
    }

    async fn try_get_all(&self, collection: Collection) -> Result<Vec<StoredRecord>> {
        let sql = format!(
            "SELECT key, value, mime, created_at, updated_at FROM {} ORDER BY key",
            collection.table_name()
        );

        self.timed(self.config.read_timeout, "get_all", async {
            let rows = sqlx::query(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(format!("Failed to scan records: {}", e)))?;

            Ok(rows.iter().map(Self::record_from_row).collect())
        })
        .await
    }

    async fn try_delete(&self, collection: Collection, key: &str) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE key = ?", collection.table_name());

        self.timed(self.config.write_timeout, "delete", async {
            sqlx::query(&sql)
                .bind(key)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(format!("Failed to delete record: {}", e)))?;
            Ok(())
        })
        .await
    }

    async fn try_clear(&self, collection: Collection) -> Result<()> {
        let sql = format!("DELETE FROM {}", collection.table_name());

        self.timed(self.config.write_timeout, "clear", async {
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(format!("Failed to clear collection: {}", e)))?;
            Ok(())
        })
        .await
    }

    async fn try_contains(&self, collection: Collection, key: &str) -> Result<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE key = ?", collection.table_name());

        self.timed(self.config.read_timeout, "contains", async {
            let row = sqlx::query(&sql)
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(format!("Failed to check key: {}", e)))?;
            Ok(row.is_some())
        })
        .await
    }

    async fn count(&self, collection: Collection) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) AS n FROM {}", collection.table_name());

        self.timed(self.config.read_timeout, "count", async {
            let row = sqlx::query(&sql)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(format!("Failed to count records: {}", e)))?;
            let n: i64 = row.get("n");
            Ok(n.max(0) as u64)
        })
        .await
    }

    async fn payload_size(&self, collection: Collection) -> Result<u64> {
        let sql = format!(
            "SELECT COALESCE(SUM(LENGTH(value)), 0) AS total FROM {}",
            collection.table_name()
        );

        self.timed(self.config.read_timeout, "payload_size", async {
            let row = sqlx::query(&sql)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(format!("Failed to size collection: {}", e)))?;
            let total: i64 = row.get("total");
            Ok(total.max(0) as u64)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = EmbeddedObjectStore::in_memory().await.unwrap();

        store
            .try_put(
                Collection::Songs,
                "song-1",
                Bytes::from_static(b"{}"),
                Some("application/json".to_string()),
            )
            .await
            .unwrap();

        let record = store
            .try_get(Collection::Songs, "song-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.key, "song-1");
        assert_eq!(record.mime.as_deref(), Some("application/json"));

        store.try_delete(Collection::Songs, "song-1").await.unwrap();
        assert!(store
            .try_get(Collection::Songs, "song-1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_absent_key_is_none_not_error() {
        let store = EmbeddedObjectStore::in_memory().await.unwrap();
        let result = store.try_get(Collection::AudioFiles, "missing").await;
        assert_eq!(result, Ok(None));
    }

    #[tokio::test]
    async fn test_delete_absent_key_succeeds() {
        let store = EmbeddedObjectStore::in_memory().await.unwrap();
        assert!(store
            .try_delete(Collection::AudioFiles, "missing")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_overwrite_preserves_created_at() {
        let store = EmbeddedObjectStore::in_memory().await.unwrap();

        store
            .try_put(Collection::Songs, "k", Bytes::from_static(b"v1"), None)
            .await
            .unwrap();
        let first = store
            .try_get(Collection::Songs, "k")
            .await
            .unwrap()
            .unwrap();

        store
            .try_put(Collection::Songs, "k", Bytes::from_static(b"v2"), None)
            .await
            .unwrap();
        let second = store
            .try_get(Collection::Songs, "k")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(second.value, Bytes::from_static(b"v2"));
        assert_eq!(second.created_at, first.created_at);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let store = EmbeddedObjectStore::in_memory().await.unwrap();

        store
            .try_put(Collection::Songs, "k", Bytes::from_static(b"v"), None)
            .await
            .unwrap();

        assert!(store
            .try_get(Collection::Playlists, "k")
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.count(Collection::Songs).await.unwrap(), 1);
        assert_eq!(store.count(Collection::Playlists).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_get_all_ordered_by_key() {
        let store = EmbeddedObjectStore::in_memory().await.unwrap();

        for key in ["b", "a", "c"] {
            store
                .try_put(Collection::Songs, key, Bytes::from_static(b"v"), None)
                .await
                .unwrap();
        }

        let records = store.try_get_all(Collection::Songs).await.unwrap();
        let keys: Vec<_> = records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_payload_size_and_clear() {
        let store = EmbeddedObjectStore::in_memory().await.unwrap();

        store
            .try_put(
                Collection::AudioFiles,
                "a",
                Bytes::from(vec![0u8; 100]),
                None,
            )
            .await
            .unwrap();
        store
            .try_put(
                Collection::AudioFiles,
                "b",
                Bytes::from(vec![0u8; 50]),
                None,
            )
            .await
            .unwrap();

        assert_eq!(store.payload_size(Collection::AudioFiles).await.unwrap(), 150);

        store.try_clear(Collection::AudioFiles).await.unwrap();
        assert_eq!(store.payload_size(Collection::AudioFiles).await.unwrap(), 0);
        assert_eq!(store.count(Collection::AudioFiles).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_contains() {
        let store = EmbeddedObjectStore::in_memory().await.unwrap();
        assert!(!store
            .try_contains(Collection::Songs, "k")
            .await
            .unwrap());

        store
            .try_put(Collection::Songs, "k", Bytes::from_static(b"v"), None)
            .await
            .unwrap();
        assert!(store.try_contains(Collection::Songs, "k").await.unwrap());
    }
}
