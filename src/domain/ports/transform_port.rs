//! Port definition for pixel transforms.

use image::DynamicImage;

use crate::domain::errors::LoadError;

/// A named, deterministic pixel transformation.
#[cfg_attr(test, mockall::automock)]
pub trait Transform: Send + Sync {
    /// Stable identity appended to the cache key for this step.
    fn key(&self) -> String;

    /// Applies the transformation.
    ///
    /// # Errors
    /// Returns a transform error when the image cannot be processed.
    fn apply(&self, image: &DynamicImage) -> Result<DynamicImage, LoadError>;
}
