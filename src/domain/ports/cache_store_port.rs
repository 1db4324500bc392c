//! Port definition for result caching.

use std::sync::Arc;

use crate::domain::entities::{CacheKey, LoadResult};

/// Key/value store of published load results.
///
/// Reads may happen from any thread. The coordinator performs every write from
/// its single coordination task.
pub trait CacheStore: Send + Sync {
    /// Returns the result cached under `key`, if any.
    fn get(&self, key: &CacheKey) -> Option<Arc<LoadResult>>;

    /// Stores a result that must never be evicted automatically.
    fn put(&self, result: Arc<LoadResult>);

    /// Stores a result that may be evicted under pressure.
    fn put_soft(&self, result: Arc<LoadResult>);

    /// Removes any result cached under `key`.
    fn remove(&self, key: &CacheKey);

    /// Returns the number of cached results.
    fn len(&self) -> usize;

    /// Returns true if the cache is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every cached result.
    fn clear(&self);
}
