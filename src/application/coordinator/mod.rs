//! Load coordinator.
//!
//! [`LoadCoordinator`] is a cheap, cloneable handle. Registry bookkeeping and
//! every cache write happen on a single actor task; callers talk to it over a
//! command channel and get back [`LoadPromise`]s. Fetching, decoding and
//! transforms run on spawned tasks and the [`WorkerPool`], never on the actor.

mod actor;
mod pipeline;


use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use self::actor::{Command, CoordinatorActor};
use crate::application::services::admission::DEFAULT_MAX_CONCURRENT_LAZY_LOADS;
use crate::application::services::{
    AdmissionController, AdmissionPolicy, FifoAdmission, Job, LoadOutcome, LoadPromise,
    PromiseResolver, PromiseState, WorkerPool,
};
use crate::domain::entities::{CacheKey, LoadRequest, LoadResult, Rect};
use crate::domain::errors::{LoadError, LoadFailure};
use crate::domain::ports::{CacheStore, FileStore, ImageDecoder};

/// Tunables for a [`LoadCoordinator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Maximum decode and transform closures running at once.
    pub worker_threads: usize,
    /// Maximum lazy loads running at once.
    pub max_concurrent_lazy_loads: usize,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            worker_threads: std::thread::available_parallelism()
                .map_or(4, std::num::NonZeroUsize::get),
            max_concurrent_lazy_loads: DEFAULT_MAX_CONCURRENT_LAZY_LOADS,
        }
    }
}

/// Snapshot of coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoordinatorStats {
    /// Registered computations, queued or running.
    pub pending: usize,
    /// Lazy loads currently running.
    pub lazy_running: usize,
    /// Lazy loads waiting for admission.
    pub lazy_queued: usize,
    /// Entries in the cache.
    pub cached: usize,
}

impl fmt::Display for CoordinatorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pending={} lazy_running={} lazy_queued={} cached={}",
            self.pending, self.lazy_running, self.lazy_queued, self.cached
        )
    }
}

/// State shared by the handle and the tasks it spawns.
pub(crate) struct Context {
    commands: mpsc::UnboundedSender<Command>,
    cache: Arc<dyn CacheStore>,
    decoder: Arc<dyn ImageDecoder>,
    files: Arc<dyn FileStore>,
    workers: WorkerPool,
    next_priority: AtomicU64,
}

impl Context {
    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, LoadError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| LoadError::Shutdown)?;
        rx.await.map_err(|_| LoadError::Shutdown)
    }

    /// Joins or starts the computation for `key` and waits for it.
    async fn acquire(&self, key: CacheKey, job: Job) -> LoadOutcome {
        let promise = self
            .call(|reply| Command::Acquire { key, job, reply })
            .await?;
        promise.await
    }

    async fn publish(&self, result: Arc<LoadResult>) -> LoadOutcome {
        self.call(|reply| Command::Publish {
            result: Arc::clone(&result),
            reply,
        })
        .await?;
        Ok(result)
    }
}

/// Handle to a running coordinator.
///
/// Clones share the same actor, cache and worker pool. The actor stops after
/// [`LoadCoordinator::shutdown`], or once every handle is dropped and
/// in-flight work has drained.
#[derive(Clone)]
pub struct LoadCoordinator {
    inner: Arc<Context>,
}

impl LoadCoordinator {
    /// Starts a coordinator with FIFO lazy-load admission.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn new(
        settings: CoordinatorSettings,
        cache: Arc<dyn CacheStore>,
        decoder: Arc<dyn ImageDecoder>,
        files: Arc<dyn FileStore>,
    ) -> Self {
        let policy = FifoAdmission::new(settings.max_concurrent_lazy_loads);
        Self::with_policy(settings, cache, decoder, files, Box::new(policy))
    }

    /// Starts a coordinator with a custom admission policy.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn with_policy(
        settings: CoordinatorSettings,
        cache: Arc<dyn CacheStore>,
        decoder: Arc<dyn ImageDecoder>,
        files: Arc<dyn FileStore>,
        policy: Box<dyn AdmissionPolicy>,
    ) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let actor = CoordinatorActor::new(
            Arc::clone(&cache),
            AdmissionController::new(policy),
            receiver,
            commands.downgrade(),
        );
        tokio::spawn(actor.run());

        info!(
            worker_threads = settings.worker_threads,
            max_concurrent_lazy_loads = settings.max_concurrent_lazy_loads,
            "Load coordinator created"
        );

        Self {
            inner: Arc::new(Context {
                commands,
                cache,
                decoder,
                files,
                workers: WorkerPool::new(settings.worker_threads),
                next_priority: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the cached result for the request's final key.
    ///
    /// Cached failures are returned too; inspect [`LoadResult::error`].
    #[must_use]
    pub fn check_cache(&self, request: &LoadRequest) -> Option<Arc<LoadResult>> {
        self.check_cache_key(request.final_key())
    }

    /// Returns the cached result for `key`.
    #[must_use]
    pub fn check_cache_key(&self, key: &CacheKey) -> Option<Arc<LoadResult>> {
        self.inner.cache.get(key)
    }

    /// Loads the request through the full pipeline.
    ///
    /// Identical concurrent requests share one computation per stage.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn request(&self, request: LoadRequest) -> LoadPromise {
        let key = request.final_key().clone();
        if let Some(cached) = self.check_cache_key(&key) {
            debug!(key = %key, "Cache hit");
            return LoadPromise::settled(key, cached.outcome());
        }

        let ctx = Arc::clone(&self.inner);
        let request = Arc::new(request);
        LoadPromise::spawn(key, async move { pipeline::run(&ctx, request).await })
    }

    /// Queues the request until the admission policy lets it run.
    ///
    /// Each call gets a fresh priority id, so earlier calls are admitted first.
    /// Dropping the returned promise does not cancel the load.
    #[must_use]
    pub fn request_lazy_load(&self, request: LoadRequest) -> LoadPromise {
        let priority = self.inner.next_priority.fetch_add(1, Ordering::Relaxed);
        let key = request.final_key().lazy(priority);
        let (resolver, promise) = PromiseResolver::new(key.clone(), PromiseState::Queued);

        let ctx = Arc::clone(&self.inner);
        let request = Arc::new(request);
        let job = async move {
            pipeline::run(&ctx, request)
                .await
                .map_err(LoadFailure::Transient)
        }
        .boxed();

        debug!(key = %key, priority, "Queueing lazy load");
        // A failed send drops the resolver, which settles the promise with a
        // shutdown error.
        let _ = self.inner.commands.send(Command::QueueLazy {
            key,
            priority,
            resolver,
            job,
        });
        promise
    }

    /// Decodes a rectangle of a deep-zoom result.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn request_region(
        &self,
        source: Arc<LoadResult>,
        region: Rect,
        sample_size: u32,
    ) -> LoadPromise {
        let sample_size = sample_size.max(1);
        let key = source.key.with_region(region, sample_size);
        if let Some(cached) = self.check_cache_key(&key) {
            debug!(key = %key, "Region cache hit");
            return LoadPromise::settled(key, cached.outcome());
        }

        let ctx = Arc::clone(&self.inner);
        let job = pipeline::region_job(&ctx, key.clone(), source, region, sample_size);
        let acquire_key = key.clone();
        LoadPromise::spawn(key, async move { ctx.acquire(acquire_key, job).await })
    }

    /// Starts queued lazy loads the admission policy allows.
    pub fn admit_ready(&self) {
        let _ = self.inner.commands.send(Command::AdmitReady);
    }

    /// Returns a snapshot of the coordinator state.
    ///
    /// # Errors
    /// Returns [`LoadError::Shutdown`] if the coordinator has stopped.
    pub async fn stats(&self) -> Result<CoordinatorStats, LoadError> {
        self.inner.call(|reply| Command::Stats { reply }).await
    }

    /// Number of queued or running computations.
    ///
    /// # Errors
    /// Returns [`LoadError::Shutdown`] if the coordinator has stopped.
    pub async fn pending_count(&self) -> Result<usize, LoadError> {
        Ok(self.stats().await?.pending)
    }

    /// Fails every outstanding promise with [`LoadError::Shutdown`] and stops
    /// the actor. Later requests fail the same way.
    pub async fn shutdown(&self) {
        if self
            .inner
            .call(|reply| Command::Shutdown { reply })
            .await
            .is_err()
        {
            debug!("Load coordinator already stopped");
        }
    }
}

impl fmt::Debug for LoadCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadCoordinator")
            .field("workers", &self.inner.workers)
            .field("closed", &self.inner.commands.is_closed())
            .finish_non_exhaustive()
    }
}
