//! Read-through TTL cache for metadata listings.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Caches one value for a fixed TTL. Mutations invalidate explicitly, so the
/// TTL only bounds staleness across processes sharing the same store.
pub struct TtlCache<T> {
    ttl: Duration,
    slot: Mutex<Option<(Instant, Arc<T>)>>,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn get(&self) -> Option<Arc<T>> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some((written, value)) if written.elapsed() < self.ttl => Some(Arc::clone(value)),
            _ => None,
        }
    }

    pub fn set(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some((Instant::now(), Arc::clone(&value)));
        value
    }

    pub fn invalidate(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_within_ttl() {
        let cache = TtlCache::new(Duration::from_secs(30));
        assert!(cache.get().is_none());

        cache.set(vec![1, 2, 3]);
        assert_eq!(*cache.get().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_expiry() {
        let cache = TtlCache::new(Duration::from_millis(0));
        cache.set(1);
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_invalidate() {
        let cache = TtlCache::new(Duration::from_secs(30));
        cache.set(1);
        cache.invalidate();
        assert!(cache.get().is_none());
    }
}
