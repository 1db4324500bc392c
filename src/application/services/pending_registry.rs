//! In-flight computation registry.
//!
//! Maps cache keys to the promise of the computation producing them. A key is
//! present exactly while its computation is queued or running, so concurrent
//! requests for the same key join one computation instead of starting another.
//!
//! The registry is plain data: it is owned by the coordination task and never
//! shared, so it needs no locking. Spawning the returned jobs is the owner's
//! responsibility.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tracing::{debug, trace};

use super::admission::LazyCandidate;
use super::promise::{LoadOutcome, LoadPromise, PromiseResolver, PromiseState};
use crate::domain::entities::{CacheKey, LoadResult};
use crate::domain::errors::LoadFailure;

/// A computation producing the result for one key.
pub type Job = BoxFuture<'static, Result<Arc<LoadResult>, LoadFailure>>;

enum EntryState {
    Queued(Job),
    Running,
}

/// One registered computation.
pub struct PendingEntry {
    resolver: PromiseResolver,
    state: EntryState,
    lazy_priority: Option<u64>,
}

impl PendingEntry {
    /// Returns true if this entry counts against the lazy budget.
    #[must_use]
    pub const fn is_lazy(&self) -> bool {
        self.lazy_priority.is_some()
    }

    /// Returns true once the computation has been started.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.state, EntryState::Running)
    }

    /// Delivers the outcome to every waiter.
    pub fn settle(self, outcome: LoadOutcome) {
        self.resolver.settle(outcome);
    }
}

impl std::fmt::Debug for PendingEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingEntry")
            .field("running", &self.is_running())
            .field("lazy_priority", &self.lazy_priority)
            .finish_non_exhaustive()
    }
}

/// Outcome of [`PendingRegistry::get_or_create`].
pub enum Registration {
    /// A computation was already registered; join it.
    Joined(LoadPromise),
    /// A new running entry was registered; the caller must run `job`.
    Started {
        /// Promise of the new computation.
        promise: LoadPromise,
        /// Computation to spawn.
        job: Job,
    },
}

/// Key to in-flight computation map.
#[derive(Debug, Default)]
pub struct PendingRegistry {
    entries: HashMap<CacheKey, PendingEntry>,
}

impl PendingRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the computation for `key`, or registers `computation` for it as
    /// running.
    ///
    /// `computation` is dropped unused if the key is already registered.
    pub fn get_or_create(&mut self, key: CacheKey, computation: Job) -> Registration {
        if let Some(entry) = self.entries.get(&key) {
            trace!(key = %key, "Joining in-flight computation");
            return Registration::Joined(entry.resolver.subscribe());
        }

        let (resolver, promise) = PromiseResolver::new(key.clone(), PromiseState::Running);
        self.insert(key, resolver, EntryState::Running, None);
        Registration::Started {
            promise,
            job: computation,
        }
    }

    /// Registers a queued entry whose promise was handed out already.
    ///
    /// Returns the resolver back if the key is taken.
    pub fn insert_queued(
        &mut self,
        key: CacheKey,
        resolver: PromiseResolver,
        lazy_priority: Option<u64>,
        computation: Job,
    ) -> Result<(), PromiseResolver> {
        if self.entries.contains_key(&key) {
            return Err(resolver);
        }
        self.insert(key, resolver, EntryState::Queued(computation), lazy_priority);
        Ok(())
    }

    fn insert(
        &mut self,
        key: CacheKey,
        resolver: PromiseResolver,
        state: EntryState,
        lazy_priority: Option<u64>,
    ) {
        debug!(
            key = %key,
            running = matches!(state, EntryState::Running),
            lazy = lazy_priority.is_some(),
            pending = self.entries.len() + 1,
            "Registered computation"
        );
        self.entries.insert(
            key,
            PendingEntry {
                resolver,
                state,
                lazy_priority,
            },
        );
    }

    /// Moves a queued entry to running and hands back its job.
    ///
    /// Returns `None` if the key is unknown or already running.
    pub fn start(&mut self, key: &CacheKey) -> Option<Job> {
        let entry = self.entries.get_mut(key)?;
        match std::mem::replace(&mut entry.state, EntryState::Running) {
            EntryState::Queued(job) => {
                entry.resolver.start();
                debug!(key = %key, "Started queued computation");
                Some(job)
            }
            EntryState::Running => None,
        }
    }

    /// Returns a new handle to the computation for `key`.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<LoadPromise> {
        self.entries.get(key).map(|entry| entry.resolver.subscribe())
    }

    /// Removes the entry for `key`. Each entry is removed at most once.
    pub fn remove(&mut self, key: &CacheKey) -> Option<PendingEntry> {
        self.entries.remove(key)
    }

    /// Lazy entries with their priority and running flag.
    #[must_use]
    pub fn lazy_candidates(&self) -> Vec<LazyCandidate> {
        self.entries
            .iter()
            .filter_map(|(key, entry)| {
                entry.lazy_priority.map(|priority| LazyCandidate {
                    key: key.clone(),
                    priority,
                    running: entry.is_running(),
                })
            })
            .collect()
    }

    /// Removes and returns every entry.
    pub fn drain(&mut self) -> Vec<(CacheKey, PendingEntry)> {
        self.entries.drain().collect()
    }

    /// Number of registered computations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use image::DynamicImage;

    fn job(key: &str) -> Job {
        let key = CacheKey::new(key);
        async move {
            Ok(Arc::new(LoadResult::decoded(
                key,
                None,
                DynamicImage::new_rgb8(1, 1),
                None,
            )))
        }
        .boxed()
    }

    #[test]
    fn test_first_registration_starts() {
        let mut registry = PendingRegistry::new();
        let registration = registry.get_or_create(CacheKey::new("a"), job("a"));

        let Registration::Started { promise, .. } = registration else {
            panic!("expected a new computation");
        };
        assert!(promise.state().is_running());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_second_registration_joins() {
        let mut registry = PendingRegistry::new();
        let _first = registry.get_or_create(CacheKey::new("a"), job("a"));
        let second = registry.get_or_create(CacheKey::new("a"), job("a"));

        assert!(matches!(second, Registration::Joined(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_different_keys_not_joined() {
        let mut registry = PendingRegistry::new();
        let a = registry.get_or_create(CacheKey::new("a"), job("a"));
        let b = registry.get_or_create(CacheKey::new("b"), job("b"));

        assert!(matches!(a, Registration::Started { .. }));
        assert!(matches!(b, Registration::Started { .. }));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_queued_entry_starts_once() {
        let mut registry = PendingRegistry::new();
        let key = CacheKey::new("a");
        let (resolver, promise) = PromiseResolver::new(key.clone(), PromiseState::Queued);
        assert!(registry.insert_queued(key.clone(), resolver, Some(1), job("a")).is_ok());

        assert!(promise.state().is_queued());
        assert!(registry.start(&key).is_some());
        assert!(promise.state().is_running());
        assert!(registry.start(&key).is_none());
    }

    #[tokio::test]
    async fn test_removal_then_settle_reaches_waiters() {
        let mut registry = PendingRegistry::new();
        let key = CacheKey::new("a");
        let Registration::Started { promise, .. } = registry.get_or_create(key.clone(), job("a"))
        else {
            panic!("expected a new computation");
        };
        let joined = registry.get(&key).unwrap();

        let entry = registry.remove(&key).unwrap();
        assert!(registry.get(&key).is_none());
        assert!(registry.remove(&key).is_none());

        entry.settle(Err(crate::domain::errors::LoadError::decode("bad")));
        assert!(promise.await.is_err());
        assert!(joined.await.is_err());
    }

    #[test]
    fn test_lazy_candidates_report_state() {
        let mut registry = PendingRegistry::new();
        let _plain = registry.get_or_create(CacheKey::new("plain"), job("plain"));
        for (name, priority) in [("q", 2), ("r", 1)] {
            let key = CacheKey::new(name);
            let (resolver, _promise) = PromiseResolver::new(key.clone(), PromiseState::Queued);
            assert!(registry.insert_queued(key, resolver, Some(priority), job(name)).is_ok());
        }
        assert!(registry.start(&CacheKey::new("r")).is_some());

        let mut candidates = registry.lazy_candidates();
        candidates.sort_by_key(|c| c.priority);

        assert_eq!(candidates.len(), 2);
        assert!(candidates[0].running);
        assert!(!candidates[1].running);
    }

    #[test]
    fn test_insert_queued_rejects_taken_key() {
        let mut registry = PendingRegistry::new();
        let key = CacheKey::new("a");
        let (resolver, _promise) = PromiseResolver::new(key.clone(), PromiseState::Queued);
        assert!(registry.insert_queued(key.clone(), resolver, Some(0), job("a")).is_ok());

        let (resolver, _promise) = PromiseResolver::new(key.clone(), PromiseState::Queued);
        assert!(registry.insert_queued(key, resolver, Some(1), job("a")).is_err());
    }
}
