//! imgflight - single-flight image loading with chained transform caching.
//!
//! Concurrent requests for the same decode or transform share one
//! computation. Every intermediate result of a transform chain is cached
//! under a composite key, so requests with a common prefix reuse it.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the load coordinator and its services.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing caches, codecs and byte sources.
pub mod infrastructure;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "imgflight";
