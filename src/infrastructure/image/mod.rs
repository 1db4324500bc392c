//! Decoding and transforms backed by the `image` crate.

pub mod decoder;
pub mod transforms;

pub use decoder::{FileRegionDecoder, StandardDecoder, downsample};
pub use transforms::{Blur, Grayscale, Resize, Rotate};
