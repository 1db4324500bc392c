//! Application layer: the load coordinator and its building blocks.

/// Coordinator handle and its actor.
pub mod coordinator;
/// Single-flight registry, promises, chain resolution, admission and workers.
pub mod services;

pub use coordinator::{CoordinatorSettings, CoordinatorStats, LoadCoordinator};
pub use services::{LoadOutcome, LoadPromise, PromiseState};
