//! Transform chain resolution.
//!
//! Finds the longest prefix of a request's transform chain already present in
//! the cache, so only the remaining steps are computed.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::domain::entities::{CacheKey, LoadResult};
use crate::domain::errors::LoadError;
use crate::domain::ports::{CacheStore, Transform};

/// Where the remaining chain starts.
#[derive(Debug, Clone)]
pub enum ChainStart {
    /// Nothing is cached; start from the bare decode.
    Decode(CacheKey),
    /// Start from this cached result.
    Cached(Arc<LoadResult>),
}

/// One transform still to apply.
#[derive(Clone)]
pub struct ChainStep {
    /// Composite key after this step.
    pub key: CacheKey,
    /// Transform producing it.
    pub transform: Arc<dyn Transform>,
}

impl fmt::Debug for ChainStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainStep").field("key", &self.key).finish()
    }
}

/// Resolved starting point plus remaining steps, in application order.
#[derive(Debug, Clone)]
pub struct ChainPlan {
    /// Starting point.
    pub start: ChainStart,
    /// Steps still to compute.
    pub steps: Vec<ChainStep>,
    /// Key of the fully transformed result.
    pub final_key: CacheKey,
}

/// Resolves the longest cached prefix of `transforms` applied to `decode_key`.
///
/// # Errors
/// Returns the captured error of the first cached entry along the chain that
/// is a failure.
pub fn resolve(
    cache: &dyn CacheStore,
    decode_key: &CacheKey,
    transforms: &[Arc<dyn Transform>],
) -> Result<ChainPlan, LoadError> {
    let mut start = match cache.get(decode_key) {
        Some(cached) => ChainStart::Cached(checked(cached)?),
        None => ChainStart::Decode(decode_key.clone()),
    };
    let mut steps = Vec::with_capacity(transforms.len());
    let mut key = decode_key.clone();

    for transform in transforms {
        key = key.with_transform(&transform.key());
        if let Some(cached) = cache.get(&key) {
            trace!(key = %key, "Cached chain prefix");
            start = ChainStart::Cached(checked(cached)?);
            steps.clear();
        } else {
            steps.push(ChainStep {
                key: key.clone(),
                transform: Arc::clone(transform),
            });
        }
    }

    debug!(
        final_key = %key,
        cached_prefix = matches!(start, ChainStart::Cached(_)),
        remaining = steps.len(),
        "Resolved transform chain"
    );
    Ok(ChainPlan {
        start,
        steps,
        final_key: key,
    })
}

/// Passes `cached` through unless it carries an error.
fn checked(cached: Arc<LoadResult>) -> Result<Arc<LoadResult>, LoadError> {
    match &cached.error {
        Some(error) => {
            debug!(key = %cached.key, error = %error, "Cached prefix carries an error");
            Err(error.clone())
        }
        None => Ok(cached),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use image::DynamicImage;
    use parking_lot::Mutex;

    use crate::domain::ports::mocks::MockTransform;

    #[derive(Default)]
    struct MapCache(Mutex<HashMap<CacheKey, Arc<LoadResult>>>);

    impl CacheStore for MapCache {
        fn get(&self, key: &CacheKey) -> Option<Arc<LoadResult>> {
            self.0.lock().get(key).cloned()
        }
        fn put(&self, result: Arc<LoadResult>) {
            self.0.lock().insert(result.key.clone(), result);
        }
        fn put_soft(&self, result: Arc<LoadResult>) {
            self.put(result);
        }
        fn remove(&self, key: &CacheKey) {
            self.0.lock().remove(key);
        }
        fn len(&self) -> usize {
            self.0.lock().len()
        }
        fn clear(&self) {
            self.0.lock().clear();
        }
    }

    fn transform(key: &str) -> Arc<dyn Transform> {
        let mut mock = MockTransform::new();
        mock.expect_key().return_const(key.to_string());
        Arc::new(mock)
    }

    fn ok(key: &str) -> Arc<LoadResult> {
        Arc::new(LoadResult::decoded(
            CacheKey::new(key),
            None,
            DynamicImage::new_rgb8(1, 1),
            None,
        ))
    }

    #[test]
    fn test_empty_cache_starts_from_decode() {
        let cache = MapCache::default();
        let chain = [transform("a"), transform("b")];
        let plan = resolve(&cache, &CacheKey::new("img"), &chain).unwrap();

        assert!(matches!(plan.start, ChainStart::Decode(_)));
        let keys: Vec<_> = plan.steps.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["img:a", "img:a:b"]);
        assert_eq!(plan.final_key.as_str(), "img:a:b");
    }

    #[test]
    fn test_longest_prefix_wins() {
        let cache = MapCache::default();
        cache.put(ok("img"));
        cache.put(ok("img:a"));
        let chain = [transform("a"), transform("b"), transform("c")];
        let plan = resolve(&cache, &CacheKey::new("img"), &chain).unwrap();

        match &plan.start {
            ChainStart::Cached(result) => assert_eq!(result.key.as_str(), "img:a"),
            ChainStart::Decode(_) => panic!("expected cached start"),
        }
        assert_eq!(plan.steps.len(), 2);
    }

    #[test]
    fn test_fully_cached_chain() {
        let cache = MapCache::default();
        cache.put(ok("img:a:b"));
        let chain = [transform("a"), transform("b")];
        let plan = resolve(&cache, &CacheKey::new("img"), &chain).unwrap();

        assert!(plan.steps.is_empty());
        assert!(matches!(plan.start, ChainStart::Cached(_)));
    }

    #[test]
    fn test_intermediate_error_fails_despite_longer_prefix() {
        let cache = MapCache::default();
        cache.put(Arc::new(LoadResult::failed(
            CacheKey::new("img:a"),
            LoadError::transform("a", "broken"),
        )));
        cache.put(ok("img:a:b"));
        let chain = [transform("a"), transform("b")];
        let err = resolve(&cache, &CacheKey::new("img"), &chain).unwrap_err();

        assert_eq!(err, LoadError::transform("a", "broken"));
    }

    #[test]
    fn test_cached_error_fails_resolution() {
        let cache = MapCache::default();
        cache.put(Arc::new(LoadResult::failed(
            CacheKey::new("img:a"),
            LoadError::transform("a", "broken"),
        )));
        let chain = [transform("a"), transform("b")];
        let err = resolve(&cache, &CacheKey::new("img"), &chain).unwrap_err();

        assert_eq!(err, LoadError::transform("a", "broken"));
    }

    #[test]
    fn test_cached_decode_error_fails_resolution() {
        let cache = MapCache::default();
        cache.put(Arc::new(LoadResult::failed(
            CacheKey::new("img"),
            LoadError::decode("corrupt"),
        )));
        let err = resolve(&cache, &CacheKey::new("img"), &[]).unwrap_err();

        assert_eq!(err, LoadError::decode("corrupt"));
    }
}
