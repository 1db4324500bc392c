//! Domain layer with core entities, errors and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{CacheKey, LoadRequest, LoadResult, Rect, RequestFlags, ServedFrom, Size};
pub use errors::{LoadError, LoadFailure};
pub use ports::{ByteSource, CacheStore, ImageDecoder, RegionDecoder, Transform};
