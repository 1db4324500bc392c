mod byte_source_port;
mod cache_store_port;
mod decoder_port;
mod file_store_port;
mod transform_port;

pub use byte_source_port::{ByteSource, Fetched};
pub use cache_store_port::CacheStore;
pub use decoder_port::{DecodeOptions, Decoded, ImageDecoder, RegionDecoder};
pub use file_store_port::FileStore;
pub use transform_port::Transform;
