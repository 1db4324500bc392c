//! Domain entity definitions.

mod cache_key;
mod geometry;
mod load_request;
mod load_result;

pub use cache_key::CacheKey;
pub use geometry::{Rect, Size};
pub use load_request::{LoadRequest, RequestFlags};
pub use load_result::{AnimationHandle, LoadResult, ServedFrom};
