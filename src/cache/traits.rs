//! Cache trait definition
//!
//! One interface over every backend: no-op, in-process LRU, persistent
//! object store, and the tiered composition of the latter two. Operations
//! are best-effort by contract: a failed `put` surfaces as a later miss,
//! never as a request error, so the trait deals in options and booleans
//! rather than results. Backends log their own failures.

use async_trait::async_trait;

use super::entry::{CacheEntry, CacheKey};

/// Cache interface implemented by all backends
#[async_trait]
pub trait Cache: Send + Sync {
    /// Look up an entry; `None` on miss or backend failure
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry>;

    /// Store an entry, replacing an existing one. Best-effort: an entry the
    /// backend cannot hold is silently dropped (detected via a later miss).
    async fn put(&self, key: CacheKey, entry: CacheEntry);

    /// Remove an entry; true if something was deleted
    async fn delete(&self, key: &CacheKey) -> bool;

    /// Drop all entries
    async fn clear(&self);

    /// Number of entries, where trackable; 0 otherwise
    async fn size(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    struct MockCache;

    #[async_trait]
    impl Cache for MockCache {
        async fn get(&self, _key: &CacheKey) -> Option<CacheEntry> {
            None
        }

        async fn put(&self, _key: CacheKey, _entry: CacheEntry) {}

        async fn delete(&self, _key: &CacheKey) -> bool {
            false
        }

        async fn clear(&self) {}

        async fn size(&self) -> usize {
            0
        }
    }

    #[test]
    fn test_trait_is_object_safe() {
        fn assert_object_safe(_cache: &dyn Cache) {}
        assert_object_safe(&MockCache);
    }

    #[test]
    fn test_mock_satisfies_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MockCache>();
    }

    #[tokio::test]
    async fn test_mock_round_trip() {
        let cache = MockCache;
        let key = CacheKey::new("a.png", "w=1", "auto");
        cache
            .put(key.clone(), CacheEntry::new(Bytes::from("data"), "text/plain"))
            .await;
        assert!(cache.get(&key).await.is_none());
        assert!(!cache.delete(&key).await);
        assert_eq!(cache.size().await, 0);
    }
}
