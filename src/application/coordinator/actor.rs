//! The coordination task.
//!
//! Owns the pending registry and admission controller and performs every cache
//! write. Handlers never await, so a command is fully applied before the next
//! one is read.

use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use super::CoordinatorStats;
use crate::application::services::transform_chain::{self, ChainPlan};
use crate::application::services::{
    AdmissionController, Job, LoadPromise, PendingRegistry, PromiseResolver, Registration,
};
use crate::domain::entities::{CacheKey, LoadRequest, LoadResult};
use crate::domain::errors::{LoadError, LoadFailure};
use crate::domain::ports::CacheStore;

/// Messages accepted by the coordination task.
pub(crate) enum Command {
    /// Resolve the cached prefix of a request's transform chain.
    Resolve {
        request: Arc<LoadRequest>,
        reply: oneshot::Sender<Result<ChainPlan, LoadError>>,
    },
    /// Return the cached result for `key`, or join or start its computation.
    Acquire {
        key: CacheKey,
        job: Job,
        reply: oneshot::Sender<LoadPromise>,
    },
    /// Register a lazy load and run admission.
    QueueLazy {
        key: CacheKey,
        priority: u64,
        resolver: PromiseResolver,
        job: Job,
    },
    /// A spawned computation finished.
    Settle {
        key: CacheKey,
        outcome: Result<Arc<LoadResult>, LoadFailure>,
    },
    /// Write a finished result to the cache.
    Publish {
        result: Arc<LoadResult>,
        reply: oneshot::Sender<()>,
    },
    AdmitReady,
    Stats {
        reply: oneshot::Sender<CoordinatorStats>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

pub(crate) struct CoordinatorActor {
    cache: Arc<dyn CacheStore>,
    registry: PendingRegistry,
    admission: AdmissionController,
    commands: mpsc::UnboundedReceiver<Command>,
    sender: mpsc::WeakUnboundedSender<Command>,
}

impl CoordinatorActor {
    pub(crate) fn new(
        cache: Arc<dyn CacheStore>,
        admission: AdmissionController,
        commands: mpsc::UnboundedReceiver<Command>,
        sender: mpsc::WeakUnboundedSender<Command>,
    ) -> Self {
        Self {
            cache,
            registry: PendingRegistry::new(),
            admission,
            commands,
            sender,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("Load coordinator started");

        while let Some(command) = self.commands.recv().await {
            if self.handle(command).is_break() {
                break;
            }
        }

        self.fail_pending();
        info!("Load coordinator stopped");
    }

    fn handle(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Resolve { request, reply } => {
                let plan = transform_chain::resolve(
                    self.cache.as_ref(),
                    request.decode_key(),
                    request.transforms(),
                );
                let _ = reply.send(plan);
            }
            Command::Acquire { key, job, reply } => {
                let promise = self.acquire(key, job);
                let _ = reply.send(promise);
            }
            Command::QueueLazy {
                key,
                priority,
                resolver,
                job,
            } => {
                self.queue_lazy(key, priority, resolver, job);
                self.admit_ready();
            }
            Command::Settle { key, outcome } => self.settle(&key, outcome),
            Command::Publish { result, reply } => {
                self.publish(result);
                let _ = reply.send(());
            }
            Command::AdmitReady => self.admit_ready(),
            Command::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
            Command::Shutdown { reply } => {
                self.fail_pending();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn acquire(&mut self, key: CacheKey, job: Job) -> LoadPromise {
        if let Some(cached) = self.cache.get(&key) {
            trace!(key = %key, "Stage cache hit");
            return LoadPromise::settled(key, cached.outcome());
        }

        match self.registry.get_or_create(key.clone(), job) {
            Registration::Started { promise, job } => {
                self.spawn(key, job);
                promise
            }
            Registration::Joined(promise) => promise,
        }
    }

    fn queue_lazy(&mut self, key: CacheKey, priority: u64, resolver: PromiseResolver, job: Job) {
        if let Err(resolver) = self
            .registry
            .insert_queued(key.clone(), resolver, Some(priority), job)
        {
            warn!(key = %key, "Lazy key already registered, joining");
            if let Some(existing) = self.registry.get(&key) {
                tokio::spawn(async move { resolver.settle(existing.await) });
            }
        }
    }

    fn admit_ready(&mut self) {
        let candidates = self.registry.lazy_candidates();
        for key in self.admission.admit_ready(&candidates) {
            if let Some(job) = self.registry.start(&key) {
                self.spawn(key, job);
            }
        }
    }

    /// Runs `job` on its own task and reports back with [`Command::Settle`].
    fn spawn(&mut self, key: CacheKey, job: Job) {
        let Some(sender) = self.sender.upgrade() else {
            if let Some(entry) = self.registry.remove(&key) {
                entry.settle(Err(LoadError::Shutdown));
            }
            return;
        };

        tokio::spawn(async move {
            let outcome = match tokio::spawn(job).await {
                Ok(outcome) => outcome,
                Err(e) => Err(LoadFailure::Terminal(LoadError::worker(format!(
                    "Load task failed: {e}"
                )))),
            };
            if sender.send(Command::Settle { key, outcome }).is_err() {
                trace!("Coordinator stopped before computation settled");
            }
        });
    }

    fn settle(&mut self, key: &CacheKey, outcome: Result<Arc<LoadResult>, LoadFailure>) {
        let Some(entry) = self.registry.remove(key) else {
            trace!(key = %key, "Settled computation no longer registered");
            return;
        };
        let lazy = entry.is_lazy();

        let delivered = match outcome {
            Ok(result) => {
                if !lazy {
                    self.publish(Arc::clone(&result));
                }
                Ok(result)
            }
            Err(LoadFailure::Transient(error)) => {
                debug!(key = %key, error = %error, "Transient failure, not cached");
                Err(error)
            }
            Err(LoadFailure::Terminal(error)) => {
                if !lazy {
                    warn!(key = %key, error = %error, "Caching terminal failure");
                    self.cache
                        .put(Arc::new(LoadResult::failed(key.clone(), error.clone())));
                }
                Err(error)
            }
        };
        entry.settle(delivered);

        if lazy {
            self.admit_ready();
        }
    }

    fn publish(&self, result: Arc<LoadResult>) {
        if result.is_deep_zoom() {
            debug!(key = %result.key, "Publishing hard entry");
            self.cache.put(result);
        } else {
            trace!(key = %result.key, "Publishing soft entry");
            self.cache.put_soft(result);
        }
    }

    fn stats(&self) -> CoordinatorStats {
        let candidates = self.registry.lazy_candidates();
        let lazy_running = candidates.iter().filter(|c| c.running).count();
        CoordinatorStats {
            pending: self.registry.len(),
            lazy_running,
            lazy_queued: candidates.len() - lazy_running,
            cached: self.cache.len(),
        }
    }

    fn fail_pending(&mut self) {
        let drained = self.registry.drain();
        if !drained.is_empty() {
            info!(count = drained.len(), "Failing outstanding loads on shutdown");
        }
        for (_, entry) in drained {
            entry.settle(Err(LoadError::Shutdown));
        }
    }
}
