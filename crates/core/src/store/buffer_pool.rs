//! Bounded LRU cache of embeddings keyed by document id.
//!
//! Sits in front of the memmap record log: a hit avoids decoding a record, a
//! miss falls back to the log. Results never depend on hit or miss.

use crate::document::Embedding;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Hit/miss counters of a [`BufferPool`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferPoolStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub len: usize,
    pub capacity: usize,
}

impl BufferPoolStats {
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.hits.saturating_add(self.misses);
        if total == 0 {
            return None;
        }
        Some(self.hits as f64 / total as f64)
    }
}

/// Size-bounded LRU cache by entry count.
pub struct BufferPool {
    inner: Mutex<LruCache<String, Arc<Embedding>>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl BufferPool {
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            capacity: capacity.get(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            inserts: AtomicU64::new(0),
        }
    }

    /// Look up an embedding, marking it most recently used.
    pub fn get(&self, id: &str) -> Option<Arc<Embedding>> {
        let value = self.inner.lock().get(id).cloned();
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    /// Insert an embedding, evicting the least recently used entry when full.
    pub fn insert(&self, id: String, embedding: Arc<Embedding>) {
        self.inner.lock().put(id, embedding);
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop a cached entry after its document changed.
    pub fn invalidate(&self, id: &str) {
        self.inner.lock().pop(id);
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> BufferPoolStats {
        BufferPoolStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            len: self.len(),
            capacity: self.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(x: f32) -> Arc<Embedding> {
        Arc::new(Embedding::new(vec![x]))
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let pool = BufferPool::new(2);
        pool.insert("a".into(), emb(1.0));
        pool.insert("b".into(), emb(2.0));
        // touch "a" so "b" becomes the eviction candidate
        assert!(pool.get("a").is_some());
        pool.insert("c".into(), emb(3.0));
        assert_eq!(pool.len(), 2);
        assert!(pool.get("b").is_none());
        assert_eq!(pool.get("c").unwrap().values(), &[3.0]);
    }

    #[test]
    fn test_stats_and_invalidate() {
        let pool = BufferPool::new(4);
        assert!(pool.get("a").is_none());
        pool.insert("a".into(), emb(1.0));
        assert!(pool.get("a").is_some());
        pool.invalidate("a");
        assert!(pool.is_empty());

        let stats = pool.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.inserts, 1);
        assert_eq!(stats.hit_rate(), Some(0.5));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let pool = BufferPool::new(0);
        pool.insert("a".into(), emb(1.0));
        pool.insert("b".into(), emb(2.0));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.stats().capacity, 1);
    }
}
