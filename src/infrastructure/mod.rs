//! Infrastructure layer with adapters for caches, codecs and byte sources.

/// In-memory bitmap cache and on-disk file store.
pub mod cache;
/// Application configuration.
pub mod config;
/// Decoders and pixel transforms.
pub mod image;
/// Byte sources.
pub mod source;

pub use cache::{CacheStats, DiskFileStore, MemoryBitmapCache};
pub use config::{AppConfig, CliArgs, LogLevel, StorageManager, TransformSpec};
pub use image::{Blur, FileRegionDecoder, Grayscale, Resize, Rotate, StandardDecoder};
pub use source::{FileSource, HttpSource, http_client};
