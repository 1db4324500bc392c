//! Byte source adapters.

pub mod file;
pub mod http;

pub use file::FileSource;
pub use http::{DEFAULT_TIMEOUT_SECS, HttpSource, http_client};
