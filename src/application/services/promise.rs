//! Shared, awaitable load results.
//!
//! A [`LoadPromise`] is the consumer side of a single computation: any number of
//! clones may wait on it and all of them observe the same outcome. The producer
//! side is a [`PromiseResolver`], which walks the promise through
//! `Queued -> Running -> Settled`.
//!
//! Dropping a promise only detaches that waiter. The computation keeps running.

use std::future::{Future, IntoFuture};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::watch;
use tracing::trace;

use crate::domain::entities::{CacheKey, LoadResult};
use crate::domain::errors::LoadError;

/// Value every waiter of a promise receives.
pub type LoadOutcome = Result<Arc<LoadResult>, LoadError>;

/// Lifecycle of a promise.
#[derive(Debug, Clone)]
pub enum PromiseState {
    /// Registered but not yet admitted to run.
    Queued,
    /// Computation in progress.
    Running,
    /// Computation finished.
    Settled(LoadOutcome),
}

impl PromiseState {
    /// Returns true once the outcome is available.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Settled(_))
    }

    /// Returns true while waiting for admission.
    #[must_use]
    pub const fn is_queued(&self) -> bool {
        matches!(self, Self::Queued)
    }

    /// Returns true while the computation runs.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Producer side of a promise.
#[derive(Debug)]
pub struct PromiseResolver {
    key: CacheKey,
    tx: watch::Sender<PromiseState>,
}

impl PromiseResolver {
    /// Creates a resolver and its first promise handle.
    #[must_use]
    pub fn new(key: CacheKey, initial: PromiseState) -> (Self, LoadPromise) {
        let (tx, rx) = watch::channel(initial);
        let promise = LoadPromise {
            key: key.clone(),
            rx,
        };
        (Self { key, tx }, promise)
    }

    /// Returns another handle observing this computation.
    #[must_use]
    pub fn subscribe(&self) -> LoadPromise {
        LoadPromise {
            key: self.key.clone(),
            rx: self.tx.subscribe(),
        }
    }

    /// Moves a queued promise to running. Returns false in any other state.
    pub fn start(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if state.is_queued() {
                *state = PromiseState::Running;
                true
            } else {
                false
            }
        })
    }

    /// Delivers the outcome to every waiter.
    pub fn settle(self, outcome: LoadOutcome) {
        trace!(key = %self.key, ok = outcome.is_ok(), waiters = self.tx.receiver_count(), "Settling promise");
        self.tx.send_replace(PromiseState::Settled(outcome));
    }
}

/// Consumer side of a computation.
///
/// Awaiting the promise (directly or through [`LoadPromise::wait`]) yields the
/// shared outcome. If the producer disappears without settling, waiters get
/// [`LoadError::Shutdown`].
#[derive(Debug, Clone)]
pub struct LoadPromise {
    key: CacheKey,
    rx: watch::Receiver<PromiseState>,
}

impl LoadPromise {
    /// Runs `future` on the runtime and returns a promise of its outcome.
    ///
    /// A panic inside `future` settles the promise with a worker error.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    pub fn spawn<F>(key: CacheKey, future: F) -> Self
    where
        F: Future<Output = LoadOutcome> + Send + 'static,
    {
        let (resolver, promise) = PromiseResolver::new(key, PromiseState::Running);
        tokio::spawn(async move {
            let outcome = match tokio::spawn(future).await {
                Ok(outcome) => outcome,
                Err(e) => Err(LoadError::worker(format!("Load task failed: {e}"))),
            };
            resolver.settle(outcome);
        });
        promise
    }

    /// Creates an already-settled promise.
    #[must_use]
    pub fn settled(key: CacheKey, outcome: LoadOutcome) -> Self {
        let (_resolver, promise) = PromiseResolver::new(key, PromiseState::Settled(outcome));
        promise
    }

    /// Key of the computation this promise observes.
    #[must_use]
    pub const fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Returns a snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> PromiseState {
        self.rx.borrow().clone()
    }

    /// Waits for the outcome.
    ///
    /// # Errors
    /// Returns the computation's error, or [`LoadError::Shutdown`] if it was
    /// abandoned without settling.
    pub async fn wait(mut self) -> LoadOutcome {
        let state = match self.rx.wait_for(PromiseState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => return Err(LoadError::Shutdown),
        };
        match state {
            PromiseState::Settled(outcome) => outcome,
            PromiseState::Queued | PromiseState::Running => Err(LoadError::Shutdown),
        }
    }
}

impl IntoFuture for LoadPromise {
    type Output = LoadOutcome;
    type IntoFuture = BoxFuture<'static, LoadOutcome>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    fn result(key: &str) -> Arc<LoadResult> {
        Arc::new(LoadResult::decoded(
            CacheKey::new(key),
            None,
            DynamicImage::new_rgb8(1, 1),
            None,
        ))
    }

    #[tokio::test]
    async fn test_all_waiters_receive_same_result() {
        let (resolver, first) = PromiseResolver::new(CacheKey::new("k"), PromiseState::Running);
        let second = resolver.subscribe();
        let expected = result("k");

        resolver.settle(Ok(Arc::clone(&expected)));

        let a = first.await.unwrap();
        let b = second.await.unwrap();
        assert!(Arc::ptr_eq(&a, &expected));
        assert!(Arc::ptr_eq(&b, &expected));
    }

    #[tokio::test]
    async fn test_queued_start_transitions_once() {
        let (resolver, promise) = PromiseResolver::new(CacheKey::new("k"), PromiseState::Queued);
        assert!(promise.state().is_queued());

        assert!(resolver.start());
        assert!(promise.state().is_running());
        assert!(!resolver.start());
    }

    #[tokio::test]
    async fn test_dropped_resolver_reports_shutdown() {
        let (resolver, promise) = PromiseResolver::new(CacheKey::new("k"), PromiseState::Running);
        drop(resolver);
        assert_eq!(promise.await.err(), Some(LoadError::Shutdown));
    }

    #[tokio::test]
    async fn test_settled_value_survives_resolver_drop() {
        let (resolver, promise) = PromiseResolver::new(CacheKey::new("k"), PromiseState::Running);
        resolver.settle(Err(LoadError::decode("bad")));
        assert!(promise.state().is_settled());
        assert_eq!(promise.await.err(), Some(LoadError::decode("bad")));
    }

    #[test]
    fn test_wait_pends_until_settled() {
        let (resolver, promise) = PromiseResolver::new(CacheKey::new("k"), PromiseState::Queued);
        let mut wait = tokio_test::task::spawn(promise.wait());
        tokio_test::assert_pending!(wait.poll());

        assert!(resolver.start());
        tokio_test::assert_pending!(wait.poll());

        resolver.settle(Err(LoadError::decode("bad")));
        assert!(wait.is_woken());
        let outcome = tokio_test::assert_ready!(wait.poll());
        assert_eq!(outcome.err(), Some(LoadError::decode("bad")));
    }

    async fn explode() -> LoadOutcome {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_spawn_maps_panic_to_worker_error() {
        let promise = LoadPromise::spawn(CacheKey::new("k"), explode());
        let err = promise.await.unwrap_err();
        assert!(matches!(err, LoadError::Worker { .. }));
    }

    #[tokio::test]
    async fn test_spawn_delivers_outcome() {
        let expected = result("k");
        let cloned = Arc::clone(&expected);
        let promise = LoadPromise::spawn(CacheKey::new("k"), async move { Ok(cloned) });
        let actual = promise.wait().await.unwrap();
        assert!(Arc::ptr_eq(&actual, &expected));
    }
}
