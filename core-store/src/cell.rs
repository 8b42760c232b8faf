//! Shared store initialization.
//!
//! Opening the backing store is expensive and must happen exactly once even
//! when several components race to use it at startup. `StoreCell` holds a
//! single shared open future: concurrent callers all await the same attempt
//! and observe the same outcome. A failed attempt is cleared from the slot so
//! the next caller starts a fresh one.

use crate::error::Result;
use crate::store::ObjectStore;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

type OpenFuture = Shared<BoxFuture<'static, Result<Arc<dyn ObjectStore>>>>;

#[derive(Default)]
pub struct StoreCell {
    slot: Mutex<Option<OpenFuture>>,
}

impl StoreCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the open store, running `factory` at most once per attempt.
    ///
    /// All callers that arrive while an open is in flight await that same
    /// future. On failure the slot is cleared (only if it still holds the
    /// failed future) so a later call can retry; the callers of the failed
    /// attempt all receive the same error.
    pub async fn get_or_open<F, Fut>(&self, factory: F) -> Result<Arc<dyn ObjectStore>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn ObjectStore>>> + Send + 'static,
    {
        let fut = {
            let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
            match slot.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    let fut = factory().boxed().shared();
                    *slot = Some(fut.clone());
                    fut
                }
            }
        };

        let result = fut.clone().await;

        if result.is_err() {
            let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
            let is_same = slot
                .as_ref()
                .map(|current| current.ptr_eq(&fut))
                .unwrap_or(false);
            if is_same {
                *slot = None;
            }
        }

        result
    }

    /// Like [`get_or_open`](Self::get_or_open), retrying once after a short
    /// delay when the first open fails. Used at bootstrap where a transient
    /// lock on the database file is common.
    pub async fn open_with_retry<F, Fut>(&self, mut factory: F) -> Result<Arc<dyn ObjectStore>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Arc<dyn ObjectStore>>> + Send + 'static,
    {
        match self.get_or_open(&mut factory).await {
            Ok(store) => Ok(store),
            Err(first) => {
                warn!(error = %first, "Store open failed, retrying once");
                tokio::time::sleep(Duration::from_secs(1)).await;
                self.get_or_open(factory).await
            }
        }
    }
}

impl std::fmt::Debug for StoreCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let opened = self
            .slot
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false);
        f.debug_struct("StoreCell").field("opened", &opened).finish()
    }
}
