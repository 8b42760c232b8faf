//! Stored record shape shared by every backend.

use crate::error::{Result, StoreError};
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

/// A single key-value record as held by an object store.
///
/// Values are opaque byte payloads. Metadata records store JSON through the
/// [`StoredRecord::from_json`] / [`StoredRecord::decode_json`] helpers; media
/// records store raw bytes with a mime type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub key: String,
    pub value: Bytes,
    pub mime: Option<String>,
    /// Unix seconds of first insert, preserved across overwrites
    pub created_at: i64,
    pub updated_at: i64,
}

impl StoredRecord {
    /// Encodes a serializable value as a JSON record payload.
    pub fn from_json<T: Serialize>(key: impl Into<String>, value: &T) -> Result<Self> {
        let encoded = serde_json::to_vec(value)
            .map_err(|e| StoreError::Corrupt(format!("JSON encode failed: {}", e)))?;

        let now = unix_now();
        Ok(Self {
            key: key.into(),
            value: Bytes::from(encoded),
            mime: Some("application/json".to_string()),
            created_at: now,
            updated_at: now,
        })
    }

    /// Decodes the payload as JSON.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.value).map_err(|e| {
            StoreError::Corrupt(format!("JSON decode failed for key {}: {}", self.key, e))
        })
    }
}

/// Current time as unix seconds.
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
