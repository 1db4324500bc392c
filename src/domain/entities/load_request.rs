//! Load request description.

use std::fmt;
use std::sync::{Arc, OnceLock};

use bitflags::bitflags;

use super::CacheKey;
use crate::domain::ports::{ByteSource, Transform};

bitflags! {
    /// Request behavior flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RequestFlags: u8 {
        /// Persist the source locally and open a region decoder over it.
        const DEEP_ZOOM = 1;
        /// Decode every frame of animated images.
        const ANIMATE = 1 << 1;
    }
}

/// Work a caller wants done: fetch, decode, then apply transforms in order.
///
/// The decode key and final key are computed on first use and memoised.
pub struct LoadRequest {
    source: Arc<dyn ByteSource>,
    transforms: Vec<Arc<dyn Transform>>,
    sample_width: u32,
    sample_height: u32,
    flags: RequestFlags,
    decode_key: OnceLock<CacheKey>,
    final_key: OnceLock<CacheKey>,
}

impl LoadRequest {
    /// Creates a request decoding `source` at full size with no transforms.
    #[must_use]
    pub fn new(source: Arc<dyn ByteSource>) -> Self {
        Self {
            source,
            transforms: Vec::new(),
            sample_width: 0,
            sample_height: 0,
            flags: RequestFlags::empty(),
            decode_key: OnceLock::new(),
            final_key: OnceLock::new(),
        }
    }

    /// Appends a transform step.
    #[must_use]
    pub fn with_transform(mut self, transform: Arc<dyn Transform>) -> Self {
        self.transforms.push(transform);
        self.reset_keys();
        self
    }

    /// Sets the target size used to pick a decode sample size.
    #[must_use]
    pub fn with_sample_size(mut self, width: u32, height: u32) -> Self {
        self.sample_width = width;
        self.sample_height = height;
        self.reset_keys();
        self
    }

    /// Sets behavior flags.
    #[must_use]
    pub fn with_flags(mut self, flags: RequestFlags) -> Self {
        self.flags = flags;
        self.reset_keys();
        self
    }

    fn reset_keys(&mut self) {
        self.decode_key = OnceLock::new();
        self.final_key = OnceLock::new();
    }

    /// The execution delegate producing the raw bytes.
    #[must_use]
    pub fn source(&self) -> &Arc<dyn ByteSource> {
        &self.source
    }

    /// Transforms in application order.
    #[must_use]
    pub fn transforms(&self) -> &[Arc<dyn Transform>] {
        &self.transforms
    }

    /// Target sample width.
    #[must_use]
    pub const fn sample_width(&self) -> u32 {
        self.sample_width
    }

    /// Target sample height.
    #[must_use]
    pub const fn sample_height(&self) -> u32 {
        self.sample_height
    }

    /// Returns true if this is a deep-zoom request.
    #[must_use]
    pub const fn is_deep_zoom(&self) -> bool {
        self.flags.contains(RequestFlags::DEEP_ZOOM)
    }

    /// Returns true if animated sources should keep all frames.
    #[must_use]
    pub const fn animate(&self) -> bool {
        self.flags.contains(RequestFlags::ANIMATE)
    }

    /// Key of the bare decode, before any transform.
    pub fn decode_key(&self) -> &CacheKey {
        self.decode_key.get_or_init(|| {
            CacheKey::decode(
                &self.source.source_key(),
                self.sample_width,
                self.sample_height,
                self.is_deep_zoom(),
                self.animate(),
            )
        })
    }

    /// Key of the fully transformed result.
    pub fn final_key(&self) -> &CacheKey {
        self.final_key.get_or_init(|| {
            self.transforms
                .iter()
                .fold(self.decode_key().clone(), |key, transform| {
                    key.with_transform(&transform.key())
                })
        })
    }
}

impl fmt::Debug for LoadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadRequest")
            .field("decode_key", self.decode_key())
            .field("transforms", &self.transforms.len())
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}
