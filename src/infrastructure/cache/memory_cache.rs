//! In-memory result cache with hard and soft retention.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::{CacheKey, LoadResult};
use crate::domain::ports::CacheStore;

/// Default number of soft entries kept in memory.
pub const DEFAULT_CACHE_SIZE: usize = 100;

struct Entries {
    hard: HashMap<CacheKey, Arc<LoadResult>>,
    soft: LruCache<CacheKey, Arc<LoadResult>>,
}

/// Result cache backed by a map of pinned entries and an LRU of evictable ones.
///
/// Hard entries are never evicted. Soft entries are dropped least recently used
/// first once `capacity` is reached.
pub struct MemoryBitmapCache {
    entries: Mutex<Entries>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryBitmapCache {
    /// Creates a cache holding at most `capacity` soft entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(Entries {
                hard: HashMap::new(),
                soft: LruCache::new(cap),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Creates a cache with the default capacity.
    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        let entries = self.entries.lock();
        CacheStats {
            hits,
            misses,
            hit_rate,
            hard: entries.hard.len(),
            soft: entries.soft.len(),
        }
    }

    /// Looks up an entry without promoting it or touching statistics.
    #[must_use]
    pub fn peek(&self, key: &CacheKey) -> Option<Arc<LoadResult>> {
        let entries = self.entries.lock();
        entries
            .hard
            .get(key)
            .or_else(|| entries.soft.peek(key))
            .cloned()
    }

    /// Returns true if `key` is pinned.
    #[must_use]
    pub fn is_hard(&self, key: &CacheKey) -> bool {
        self.entries.lock().hard.contains_key(key)
    }
}

impl Default for MemoryBitmapCache {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Pinned entries.
    pub hard: usize,
    /// Evictable entries.
    pub soft: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} entries ({} pinned), {:.1}% hit rate ({} hits, {} misses)",
            self.hard + self.soft,
            self.hard,
            self.hit_rate,
            self.hits,
            self.misses
        )
    }
}

impl CacheStore for MemoryBitmapCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<LoadResult>> {
        let mut guard = self.entries.lock();
        let entries = &mut *guard;
        let found = entries
            .hard
            .get(key)
            .cloned()
            .or_else(|| entries.soft.get(key).cloned());
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache miss");
        }
        found
    }

    fn put(&self, result: Arc<LoadResult>) {
        let mut entries = self.entries.lock();
        entries.soft.pop(&result.key);
        debug!(key = %result.key, "Pinning result in memory cache");
        entries.hard.insert(result.key.clone(), result);
    }

    fn put_soft(&self, result: Arc<LoadResult>) {
        let mut entries = self.entries.lock();
        if let Some(pinned) = entries.hard.get_mut(&result.key) {
            *pinned = result;
            return;
        }
        let key = result.key.clone();
        trace!(key = %key, "Storing result in memory cache");
        if let Some((evicted, _)) = entries.soft.push(key.clone(), result)
            && evicted != key
        {
            trace!(key = %evicted, "Evicted soft entry");
        }
    }

    fn remove(&self, key: &CacheKey) {
        let mut entries = self.entries.lock();
        let pinned = entries.hard.remove(key).is_some();
        let soft = entries.soft.pop(key).is_some();
        if pinned || soft {
            debug!(key = %key, "Removed result from memory cache");
        }
    }

    fn len(&self) -> usize {
        let entries = self.entries.lock();
        entries.hard.len() + entries.soft.len()
    }

    fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.hard.clear();
        entries.soft.clear();
        debug!("Cleared memory cache");
    }
}
