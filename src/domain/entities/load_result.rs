//! Decoded load results.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use image::DynamicImage;

use super::{CacheKey, Size};
use crate::domain::errors::LoadError;
use crate::domain::ports::RegionDecoder;

/// Where a result's bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServedFrom {
    /// Produced in memory from already-decoded data.
    #[default]
    Memory,
    /// Read from the local disk store.
    DiskCache,
    /// Read from a local file outside the store.
    LocalFile,
    /// Downloaded from the network.
    Network,
}

impl fmt::Display for ServedFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::DiskCache => write!(f, "disk"),
            Self::LocalFile => write!(f, "file"),
            Self::Network => write!(f, "network"),
        }
    }
}

/// Decoded frames of an animated image.
#[derive(Clone)]
pub struct AnimationHandle {
    frames: Arc<Vec<image::Frame>>,
}

impl AnimationHandle {
    /// Wraps decoded frames.
    #[must_use]
    pub fn new(frames: Vec<image::Frame>) -> Self {
        Self {
            frames: Arc::new(frames),
        }
    }

    /// Returns all frames in display order.
    #[must_use]
    pub fn frames(&self) -> &[image::Frame] {
        &self.frames
    }

    /// Number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if there are no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl fmt::Debug for AnimationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationHandle")
            .field("frames", &self.frames.len())
            .finish()
    }
}

/// Outcome of a decode, transform or region stage for one cache key.
///
/// A published result holds exactly one of `image` or `error`. Results are shared
/// as `Arc<LoadResult>` and never mutated after publication.
#[derive(Debug, Clone)]
pub struct LoadResult {
    /// Key this result is cached under.
    pub key: CacheKey,
    /// MIME type reported by the decoder.
    pub mime_type: Option<String>,
    /// Decoded pixels.
    pub image: Option<Arc<DynamicImage>>,
    /// Size of the source before sampling.
    pub original_size: Option<Size>,
    /// All frames, when an animated source was decoded with animation enabled.
    pub animation: Option<AnimationHandle>,
    /// Open region decoder for tiled access.
    pub region_decoder: Option<Arc<dyn RegionDecoder>>,
    /// Local file backing the region decoder.
    pub backing_file: Option<PathBuf>,
    /// Captured terminal error.
    pub error: Option<LoadError>,
    /// Provenance.
    pub served_from: ServedFrom,
}

impl LoadResult {
    /// Creates a successful result.
    #[must_use]
    pub fn decoded(
        key: CacheKey,
        mime_type: Option<String>,
        image: DynamicImage,
        original_size: Option<Size>,
    ) -> Self {
        Self::from_shared(key, mime_type, Arc::new(image), original_size)
    }

    /// Creates a successful result around already-shared pixels.
    #[must_use]
    pub fn from_shared(
        key: CacheKey,
        mime_type: Option<String>,
        image: Arc<DynamicImage>,
        original_size: Option<Size>,
    ) -> Self {
        Self {
            key,
            mime_type,
            image: Some(image),
            original_size,
            animation: None,
            region_decoder: None,
            backing_file: None,
            error: None,
            served_from: ServedFrom::Memory,
        }
    }

    /// Creates a result capturing a terminal error.
    #[must_use]
    pub fn failed(key: CacheKey, error: LoadError) -> Self {
        Self {
            key,
            mime_type: None,
            image: None,
            original_size: None,
            animation: None,
            region_decoder: None,
            backing_file: None,
            error: Some(error),
            served_from: ServedFrom::Memory,
        }
    }

    /// Sets the provenance.
    #[must_use]
    pub fn with_served_from(mut self, served_from: ServedFrom) -> Self {
        self.served_from = served_from;
        self
    }

    /// Attaches animation frames.
    #[must_use]
    pub fn with_animation(mut self, animation: AnimationHandle) -> Self {
        self.animation = Some(animation);
        self
    }

    /// Attaches an open region decoder and its backing file.
    #[must_use]
    pub fn with_region_decoder(mut self, decoder: Arc<dyn RegionDecoder>, file: PathBuf) -> Self {
        self.region_decoder = Some(decoder);
        self.backing_file = Some(file);
        self
    }

    /// Returns true if this result carries pixels and no error.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none() && self.image.is_some()
    }

    /// Returns true if this result is the source of a tiled image.
    #[must_use]
    pub const fn is_deep_zoom(&self) -> bool {
        self.region_decoder.is_some()
    }

    /// Dimensions of the decoded pixels.
    #[must_use]
    pub fn dimensions(&self) -> Option<Size> {
        self.image
            .as_ref()
            .map(|img| Size::new(img.width(), img.height()))
    }

    /// Converts a shared result into the value a waiter should observe.
    ///
    /// # Errors
    /// Returns the captured error when the result represents a failure.
    pub fn outcome(self: &Arc<Self>) -> Result<Arc<Self>, LoadError> {
        match &self.error {
            Some(error) => Err(error.clone()),
            None => Ok(Arc::clone(self)),
        }
    }
}
