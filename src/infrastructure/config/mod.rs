//! Application configuration.

pub mod app_config;
pub mod args;
pub mod storage;

pub use app_config::{AppConfig, CacheConfig, CoordinatorConfig, LogLevel, NetworkConfig};
pub use args::{CliArgs, TransformSpec};
pub use storage::{ConfigError, StorageManager};
