//! Coordination building blocks.

pub mod admission;
pub mod pending_registry;
pub mod promise;
pub mod transform_chain;
pub mod worker_pool;

pub use admission::{AdmissionController, AdmissionPolicy, FifoAdmission, LazyCandidate};
pub use pending_registry::{Job, PendingRegistry, Registration};
pub use promise::{LoadOutcome, LoadPromise, PromiseResolver, PromiseState};
pub use transform_chain::{ChainPlan, ChainStart, ChainStep};
pub use worker_pool::WorkerPool;
