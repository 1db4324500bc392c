//! Built-in pixel transforms.
//!
//! Each transform's key encodes every parameter that affects its output, so
//! two transforms with equal keys always produce equal pixels.

use image::DynamicImage;
use image::imageops::FilterType;

use crate::domain::errors::LoadError;
use crate::domain::ports::Transform;

/// Scales to exact dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resize {
    width: u32,
    height: u32,
}

impl Resize {
    /// Creates a resize to `width` x `height`.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Transform for Resize {
    fn key(&self) -> String {
        format!("resize({}x{})", self.width, self.height)
    }

    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage, LoadError> {
        if self.width == 0 || self.height == 0 {
            return Err(LoadError::transform(self.key(), "target size must be non-zero"));
        }
        Ok(image.resize_exact(self.width, self.height, FilterType::Triangle))
    }
}

/// Converts to luminance.
#[derive(Debug, Clone, Copy, Default)]
pub struct Grayscale;

impl Transform for Grayscale {
    fn key(&self) -> String {
        "grayscale".to_string()
    }

    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage, LoadError> {
        Ok(image.grayscale())
    }
}

/// Gaussian blur.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blur {
    sigma: f32,
}

impl Blur {
    /// Creates a blur with standard deviation `sigma`.
    #[must_use]
    pub const fn new(sigma: f32) -> Self {
        Self { sigma }
    }
}

impl Transform for Blur {
    fn key(&self) -> String {
        format!("blur({})", self.sigma)
    }

    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage, LoadError> {
        if !self.sigma.is_finite() || self.sigma < 0.0 {
            return Err(LoadError::transform(self.key(), "sigma must be a non-negative number"));
        }
        Ok(image.blur(self.sigma))
    }
}

/// Clockwise rotation by a multiple of 90 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rotate {
    degrees: u32,
}

impl Rotate {
    /// Creates a rotation. Angles are normalized to `0..360`.
    #[must_use]
    pub const fn new(degrees: u32) -> Self {
        Self {
            degrees: degrees % 360,
        }
    }
}

impl Transform for Rotate {
    fn key(&self) -> String {
        format!("rotate({})", self.degrees)
    }

    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage, LoadError> {
        match self.degrees {
            0 => Ok(image.clone()),
            90 => Ok(image.rotate90()),
            180 => Ok(image.rotate180()),
            270 => Ok(image.rotate270()),
            other => Err(LoadError::transform(
                self.key(),
                format!("{other} is not a multiple of 90"),
            )),
        }
    }
}
