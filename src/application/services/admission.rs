//! Lazy-load admission.
//!
//! Lazy loads are registered queued and only start when the policy admits them.
//! The controller is consulted whenever a lazy load is queued or finishes.

use tracing::debug;

use crate::domain::entities::CacheKey;

/// Default number of lazy loads allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT_LAZY_LOADS: usize = 5;

/// Snapshot of one lazy registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LazyCandidate {
    /// Registry key.
    pub key: CacheKey,
    /// Priority id. Lower values were queued earlier.
    pub priority: u64,
    /// Whether the computation already runs.
    pub running: bool,
}

/// Decides which queued lazy loads may start.
pub trait AdmissionPolicy: Send + std::fmt::Debug {
    /// Returns the keys to start, in start order.
    fn admit(&self, candidates: &[LazyCandidate]) -> Vec<CacheKey>;
}

/// First-in first-out admission with a fixed concurrency budget.
#[derive(Debug, Clone, Copy)]
pub struct FifoAdmission {
    max_concurrent: usize,
}

impl FifoAdmission {
    /// Creates a policy allowing `max_concurrent` lazy loads at once.
    ///
    /// A budget of zero is raised to one so queued loads always make progress.
    #[must_use]
    pub const fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: if max_concurrent == 0 { 1 } else { max_concurrent },
        }
    }

    /// Configured budget.
    #[must_use]
    pub const fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

impl Default for FifoAdmission {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT_LAZY_LOADS)
    }
}

impl AdmissionPolicy for FifoAdmission {
    fn admit(&self, candidates: &[LazyCandidate]) -> Vec<CacheKey> {
        let running = candidates.iter().filter(|c| c.running).count();
        let budget = self.max_concurrent.saturating_sub(running);
        if budget == 0 {
            return Vec::new();
        }

        let mut queued: Vec<&LazyCandidate> = candidates.iter().filter(|c| !c.running).collect();
        queued.sort_by_key(|c| c.priority);
        queued
            .into_iter()
            .take(budget)
            .map(|c| c.key.clone())
            .collect()
    }
}

/// Applies an [`AdmissionPolicy`] to the current lazy registrations.
#[derive(Debug)]
pub struct AdmissionController {
    policy: Box<dyn AdmissionPolicy>,
}

impl AdmissionController {
    /// Creates a controller around `policy`.
    #[must_use]
    pub fn new(policy: Box<dyn AdmissionPolicy>) -> Self {
        Self { policy }
    }

    /// Returns the keys that should start now.
    #[must_use]
    pub fn admit_ready(&self, candidates: &[LazyCandidate]) -> Vec<CacheKey> {
        let admitted = self.policy.admit(candidates);
        if !admitted.is_empty() {
            debug!(
                admitted = admitted.len(),
                candidates = candidates.len(),
                "Admitting lazy loads"
            );
        }
        admitted
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new(Box::new(FifoAdmission::default()))
    }
}
