//! Decoders backed by the `image` crate.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use image::codecs::gif::GifDecoder;
use image::imageops::FilterType;
use image::{AnimationDecoder, DynamicImage, ImageFormat, ImageReader};
use tracing::{debug, trace};

use crate::domain::entities::{AnimationHandle, Rect, Size};
use crate::domain::errors::LoadError;
use crate::domain::ports::{DecodeOptions, Decoded, ImageDecoder, RegionDecoder};

const GIF_MIME: &str = "image/gif";

fn decode_error(e: impl std::fmt::Display) -> LoadError {
    LoadError::decode(e.to_string())
}

fn guess_format(bytes: &[u8]) -> Result<(ImageReader<Cursor<&[u8]>>, ImageFormat), LoadError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| LoadError::decode(format!("Format error: {e}")))?;
    let format = reader
        .format()
        .ok_or_else(|| LoadError::decode("Unrecognized image format"))?;
    Ok((reader, format))
}

/// Shrinks `image` by an integer factor. A factor of 1 returns it unchanged.
#[must_use]
pub fn downsample(image: DynamicImage, sample_size: u32) -> DynamicImage {
    if sample_size <= 1 {
        return image;
    }
    let width = (image.width() / sample_size).max(1);
    let height = (image.height() / sample_size).max(1);
    image.resize_exact(width, height, FilterType::Triangle)
}

/// Decodes PNG, JPEG, WebP and GIF from memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDecoder;

impl StandardDecoder {
    /// Creates a decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn decode_animation(bytes: &[u8]) -> Result<(DynamicImage, AnimationHandle), LoadError> {
        let decoder = GifDecoder::new(Cursor::new(bytes)).map_err(decode_error)?;
        let frames = decoder
            .into_frames()
            .collect_frames()
            .map_err(decode_error)?;
        let first = frames
            .first()
            .map(|frame| DynamicImage::ImageRgba8(frame.buffer().clone()))
            .ok_or_else(|| LoadError::decode("Animation has no frames"))?;
        trace!(frames = frames.len(), "Decoded animation");
        Ok((first, AnimationHandle::new(frames)))
    }
}

impl ImageDecoder for StandardDecoder {
    fn probe(
        &self,
        bytes: &[u8],
        target_width: u32,
        target_height: u32,
    ) -> Result<DecodeOptions, LoadError> {
        let (reader, format) = guess_format(bytes)?;
        let (width, height) = reader.into_dimensions().map_err(decode_error)?;
        let size = Size::new(width, height);
        let sample_size = size.sample_size_for(target_width, target_height);

        trace!(size = %size, sample_size, format = ?format, "Probed image header");
        Ok(DecodeOptions {
            size,
            mime_type: Some(format.to_mime_type().to_string()),
            sample_size,
        })
    }

    fn decode(
        &self,
        bytes: &[u8],
        options: &DecodeOptions,
        animate: bool,
    ) -> Result<Decoded, LoadError> {
        if animate && options.mime_type.as_deref() == Some(GIF_MIME) {
            let (image, animation) = Self::decode_animation(bytes)?;
            return Ok(Decoded {
                image: downsample(image, options.sample_size),
                animation: Some(animation),
            });
        }

        let (reader, _) = guess_format(bytes)?;
        let image = reader.decode().map_err(decode_error)?;
        Ok(Decoded {
            image: downsample(image, options.sample_size),
            animation: None,
        })
    }

    fn open_region_decoder(&self, path: &Path) -> Result<Arc<dyn RegionDecoder>, LoadError> {
        Ok(Arc::new(FileRegionDecoder::open(path)?))
    }
}

/// Region decoder over a fully decoded local file.
pub struct FileRegionDecoder {
    image: DynamicImage,
    mime_type: Option<String>,
}

impl FileRegionDecoder {
    /// Reads and decodes `path`.
    ///
    /// # Errors
    /// Returns an io error if the file cannot be read, or a decode error if
    /// its contents are not a supported image.
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path)
            .map_err(|e| LoadError::io(format!("Failed to read {}: {e}", path.display())))?;
        let (reader, format) = guess_format(&bytes)?;
        let image = reader.decode().map_err(decode_error)?;
        debug!(path = %path.display(), width = image.width(), height = image.height(), "Opened region decoder");
        Ok(Self {
            image,
            mime_type: Some(format.to_mime_type().to_string()),
        })
    }
}

impl std::fmt::Debug for FileRegionDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRegionDecoder")
            .field("size", &self.size())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

impl RegionDecoder for FileRegionDecoder {
    fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }

    fn mime_type(&self) -> Option<String> {
        self.mime_type.clone()
    }

    fn decode_region(&self, region: Rect, sample_size: u32) -> Result<DynamicImage, LoadError> {
        let size = self.size();
        if !region.fits_within(size) {
            return Err(LoadError::region(format!(
                "({}, {}, {}, {}) outside {size}",
                region.left,
                region.top,
                region.right(),
                region.bottom()
            )));
        }
        let cropped = self
            .image
            .crop_imm(region.left, region.top, region.width, region.height);
        Ok(downsample(cropped, sample_size))
    }
}
