//! The object store abstraction.
//!
//! Backends implement the `try_*` methods, which surface every failure as a
//! [`StoreError`]. The provided fail-soft wrappers (`put`, `get`, ...) log and
//! swallow errors for callers that treat the cache as best-effort, such as
//! thumbnail storage. Callers that must distinguish "absent" from "broken"
//! use the `try_*` methods directly.

use crate::collection::Collection;
use crate::error::Result;
use crate::record::StoredRecord;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::warn;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Inserts or overwrites a record. Overwrites preserve `created_at`.
    async fn try_put(
        &self,
        collection: Collection,
        key: &str,
        value: Bytes,
        mime: Option<String>,
    ) -> Result<()>;

    /// Fetches a record. `Ok(None)` means the key is genuinely absent.
    async fn try_get(&self, collection: Collection, key: &str) -> Result<Option<StoredRecord>>;

    /// Fetches every record in a collection, ordered by key.
    async fn try_get_all(&self, collection: Collection) -> Result<Vec<StoredRecord>>;

    /// Deletes a record. Deleting an absent key succeeds.
    async fn try_delete(&self, collection: Collection, key: &str) -> Result<()>;

    /// Deletes every record in a collection.
    async fn try_clear(&self, collection: Collection) -> Result<()>;

    /// Checks whether a key exists without loading the payload.
    async fn try_contains(&self, collection: Collection, key: &str) -> Result<bool>;

    /// Number of records in a collection.
    async fn count(&self, collection: Collection) -> Result<u64>;

    /// Total payload bytes held by a collection.
    async fn payload_size(&self, collection: Collection) -> Result<u64>;

    /// Fail-soft put. Returns whether the write succeeded.
    async fn put(
        &self,
        collection: Collection,
        key: &str,
        value: Bytes,
        mime: Option<String>,
    ) -> bool {
        match self.try_put(collection, key, value, mime).await {
            Ok(()) => true,
            Err(e) => {
                warn!(collection = %collection, key = key, error = %e, "Store write failed");
                false
            }
        }
    }

    /// Fail-soft get. Absent keys and backend failures both yield `None`.
    async fn get(&self, collection: Collection, key: &str) -> Option<StoredRecord> {
        match self.try_get(collection, key).await {
            Ok(record) => record,
            Err(e) => {
                warn!(collection = %collection, key = key, error = %e, "Store read failed");
                None
            }
        }
    }

    /// Fail-soft get-all. Backend failures yield an empty list.
    async fn get_all(&self, collection: Collection) -> Vec<StoredRecord> {
        match self.try_get_all(collection).await {
            Ok(records) => records,
            Err(e) => {
                warn!(collection = %collection, error = %e, "Store scan failed");
                Vec::new()
            }
        }
    }

    /// Fail-soft delete. Returns whether the delete succeeded.
    async fn delete(&self, collection: Collection, key: &str) -> bool {
        match self.try_delete(collection, key).await {
            Ok(()) => true,
            Err(e) => {
                warn!(collection = %collection, key = key, error = %e, "Store delete failed");
                false
            }
        }
    }

    /// Fail-soft clear. Returns whether the clear succeeded.
    async fn clear(&self, collection: Collection) -> bool {
        match self.try_clear(collection).await {
            Ok(()) => true,
            Err(e) => {
                warn!(collection = %collection, error = %e, "Store clear failed");
                false
            }
        }
    }
}
