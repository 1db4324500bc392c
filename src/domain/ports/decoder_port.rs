//! Port definitions for pixel decoding.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;

use crate::domain::entities::{AnimationHandle, Rect, Size};
use crate::domain::errors::LoadError;

/// Header information and sampling decision computed before a full decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Full size of the encoded image.
    pub size: Size,
    /// MIME type derived from the format.
    pub mime_type: Option<String>,
    /// Power-of-two downsampling factor; 1 decodes at full size.
    pub sample_size: u32,
}

/// Pixels produced by a full decode.
#[derive(Debug)]
pub struct Decoded {
    /// First (or only) frame.
    pub image: DynamicImage,
    /// All frames when an animated image was decoded with animation enabled.
    pub animation: Option<AnimationHandle>,
}

/// Decoding primitives.
///
/// Methods are blocking and are only called from worker-pool threads.
pub trait ImageDecoder: Send + Sync {
    /// Reads the header of `bytes` and picks a sample size for the target.
    ///
    /// # Errors
    /// Returns a decode error when the format cannot be recognized.
    fn probe(
        &self,
        bytes: &[u8],
        target_width: u32,
        target_height: u32,
    ) -> Result<DecodeOptions, LoadError>;

    /// Decodes `bytes` according to previously probed options.
    ///
    /// # Errors
    /// Returns a decode error when the pixel data is invalid.
    fn decode(
        &self,
        bytes: &[u8],
        options: &DecodeOptions,
        animate: bool,
    ) -> Result<Decoded, LoadError>;

    /// Opens a region decoder over a local file.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read or decoded.
    fn open_region_decoder(&self, path: &Path) -> Result<Arc<dyn RegionDecoder>, LoadError>;
}

/// An open handle that decodes rectangular regions of one image.
pub trait RegionDecoder: Send + Sync + fmt::Debug {
    /// Full size of the underlying image.
    fn size(&self) -> Size;

    /// MIME type of the underlying image.
    fn mime_type(&self) -> Option<String>;

    /// Decodes `region`, downsampled by `sample_size`.
    ///
    /// # Errors
    /// Returns a region error when the rectangle is out of bounds.
    fn decode_region(&self, region: Rect, sample_size: u32) -> Result<DynamicImage, LoadError>;
}
