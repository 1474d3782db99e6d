//! In-process cache backends
//!
//! `LruCache` holds entries under a fixed byte budget with strict
//! least-recently-used eviction: a monotonic counter stamps every get and
//! put, and eviction always removes the smallest stamp. `NullCache` is the
//! inert backend used when caching is disabled.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::entry::{CacheEntry, CacheKey};
use super::traits::Cache;

struct StoredEntry {
    entry: CacheEntry,
    stamp: u64,
}

struct LruState {
    entries: HashMap<CacheKey, StoredEntry>,
    current_size: u64,
    access_counter: u64,
}

/// Strict-LRU in-process cache over a byte budget.
///
/// `entry_size = data.len + content_type.len` counts against the budget.
/// Entries larger than the whole budget are silently not stored. Even
/// `get` takes the write lock because it bumps the access stamp.
pub struct LruCache {
    budget: u64,
    state: RwLock<LruState>,
}

impl LruCache {
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            state: RwLock::new(LruState {
                entries: HashMap::new(),
                current_size: 0,
                access_counter: 0,
            }),
        }
    }

    /// Bytes currently held (for tests and metrics)
    pub fn current_size_bytes(&self) -> u64 {
        self.state.read().current_size
    }

    fn evict_lru(state: &mut LruState) {
        let victim = state
            .entries
            .iter()
            .min_by_key(|(_, stored)| stored.stamp)
            .map(|(key, _)| key.clone());
        if let Some(key) = victim {
            if let Some(stored) = state.entries.remove(&key) {
                state.current_size -= stored.entry.size_bytes() as u64;
                tracing::trace!(key = %key, "evicted LRU cache entry");
            }
        }
    }
}

#[async_trait]
impl Cache for LruCache {
    async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let mut state = self.state.write();
        state.access_counter += 1;
        let stamp = state.access_counter;
        let stored = state.entries.get_mut(key)?;
        stored.stamp = stamp;
        Some(stored.entry.clone())
    }

    async fn put(&self, key: CacheKey, entry: CacheEntry) {
        let new_size = entry.size_bytes() as u64;
        if new_size > self.budget {
            // Oversize entries are not stored; callers detect via a miss
            tracing::debug!(key = %key, size = new_size, "entry exceeds cache budget, skipping");
            return;
        }

        let mut state = self.state.write();
        state.access_counter += 1;
        let stamp = state.access_counter;

        if let Some(old) = state.entries.remove(&key) {
            state.current_size -= old.entry.size_bytes() as u64;
        }

        while state.current_size + new_size > self.budget && !state.entries.is_empty() {
            Self::evict_lru(&mut state);
        }

        state.current_size += new_size;
        state.entries.insert(key, StoredEntry { entry, stamp });
    }

    async fn delete(&self, key: &CacheKey) -> bool {
        let mut state = self.state.write();
        match state.entries.remove(key) {
            Some(stored) => {
                state.current_size -= stored.entry.size_bytes() as u64;
                true
            }
            None => false,
        }
    }

    async fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.current_size = 0;
    }

    async fn size(&self) -> usize {
        self.state.read().entries.len()
    }
}

/// No-op cache used when caching is disabled
pub struct NullCache;

#[async_trait]
impl Cache for NullCache {
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
