//! Tiered cache - fast in-process layer over a persistent layer
//!
//! `get` walks L1 then L2, promoting L2 hits into L1 synchronously so the
//! next read is fast. `put` writes L1 synchronously and dispatches the L2
//! write to the runtime so the response is never blocked on the store;
//! the spawned task owns clones of key and entry. `delete` and `clear`
//! always reach both layers.

use std::sync::Arc;

use async_trait::async_trait;

use super::entry::{CacheEntry, CacheKey};
use super::traits::Cache;

pub struct TieredCache {
    l1: Arc<dyn Cache>,
    l2: Arc<dyn Cache>,
    /// When false, L2 writes happen inline (used by tests and shutdown paths)
    async_l2_writes: bool,
}

impl TieredCache {
    pub fn new(l1: Arc<dyn Cache>, l2: Arc<dyn Cache>) -> Self {
        Self {
            l1,
            l2,
            async_l2_writes: true,
        }
    }

    /// Synchronous L2 writes; the put only returns once both layers hold
    /// the entry
    pub fn with_sync_writes(l1: Arc<dyn Cache>, l2: Arc<dyn Cache>) -> Self {
        Self {
            l1,
            l2,
            async_l2_writes: false,
        }
    }
}

#[async_trait]
impl Cache for TieredCache {
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        if let Some(entry) = self.l1.get(key).await {
            return Some(entry);
        }

        let entry = self.l2.get(key).await?;
        // Promote synchronously so a follow-up read hits L1
        self.l1.put(key.clone(), entry.clone()).await;
        Some(entry)
    }

    async fn put(&self, key: CacheKey, entry: CacheEntry) {
        self.l1.put(key.clone(), entry.clone()).await;

        if self.async_l2_writes {
            // The task owns its copies; nothing borrows from the caller
            let l2 = Arc::clone(&self.l2);
            tokio::spawn(async move {
                l2.put(key, entry).await;
            });
        } else {
            self.l2.put(key, entry).await;
        }
    }

    async fn delete(&self, key: &CacheKey) -> bool {
        // Both layers are always consulted; no short-circuit
        let l1_deleted = self.l1.delete(key).await;
        let l2_deleted = self.l2.delete(key).await;
        l1_deleted || l2_deleted
    }

    async fn clear(&self) {
        self.l1.clear().await;
        self.l2.clear().await;
    }

    async fn size(&self) -> usize {
        // L2 is not trackable and is the slow path
        self.l1.size().await
    }
}
