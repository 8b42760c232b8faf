//! Handles to cached media payloads.

use bytes::Bytes;
use uuid::Uuid;

/// A loaded media payload with a unique locator.
///
/// Every load mints a fresh locator, so a handle identifies one particular
/// materialization of the payload. Overwriting a song's media produces a new
/// handle with a new locator; existing handles stay usable by whoever holds
/// them and are released when the last `Arc` drops. Nothing revokes a handle
/// behind a holder's back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaHandle {
    pub song_id: String,
    /// Opaque locator, e.g. `mem://audio/<song>/<uuid>`
    pub locator: String,
    pub mime: String,
    pub payload: Bytes,
}

impl MediaHandle {
    pub(crate) fn new(kind: &str, song_id: &str, mime: String, payload: Bytes) -> Self {
        Self {
            song_id: song_id.to_string(),
            locator: format!("mem://{}/{}/{}", kind, song_id, Uuid::new_v4()),
            mime,
            payload,
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
