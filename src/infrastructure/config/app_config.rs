//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::application::CoordinatorSettings;
use crate::application::services::admission::DEFAULT_MAX_CONCURRENT_LAZY_LOADS;
use crate::infrastructure::cache::{DEFAULT_CACHE_SIZE, DEFAULT_MAX_STORE_SIZE};
use crate::infrastructure::source::DEFAULT_TIMEOUT_SECS;

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration, read from `config.toml` and overridden by CLI
/// flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log file path. Logs go to stderr when unset.
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Coordinator configuration.
    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    /// Network configuration.
    #[serde(default)]
    pub network: NetworkConfig,
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Soft entries kept in the in-memory LRU.
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,

    /// Directory for deep-zoom source files.
    #[serde(default)]
    pub store_dir: Option<PathBuf>,

    /// Disk store budget in bytes.
    #[serde(default = "default_max_store_size")]
    pub max_store_size: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_capacity: default_memory_capacity(),
            store_dir: None,
            max_store_size: default_max_store_size(),
        }
    }
}

/// Coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Decode and transform worker count. Defaults to available parallelism.
    #[serde(default)]
    pub worker_threads: Option<usize>,

    /// Lazy loads allowed to run at once.
    #[serde(default = "default_max_concurrent_lazy_loads")]
    pub max_concurrent_lazy_loads: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            max_concurrent_lazy_loads: default_max_concurrent_lazy_loads(),
        }
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_memory_capacity() -> usize {
    DEFAULT_CACHE_SIZE
}

fn default_max_store_size() -> u64 {
    DEFAULT_MAX_STORE_SIZE
}

fn default_max_concurrent_lazy_loads() -> usize {
    DEFAULT_MAX_CONCURRENT_LAZY_LOADS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

use super::args::CliArgs;

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(workers) = args.workers {
            self.coordinator.worker_threads = Some(workers);
        }
        if let Some(max_lazy) = args.max_lazy_loads {
            self.coordinator.max_concurrent_lazy_loads = max_lazy;
        }
        if let Some(capacity) = args.cache_capacity {
            self.cache.memory_capacity = capacity;
        }
        if let Some(store_dir) = &args.store_dir {
            self.cache.store_dir = Some(store_dir.clone());
        }
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone()
    }

    /// Coordinator tunables derived from this configuration.
    ///
    /// Zero worker or lazy-load budgets are raised to one.
    #[must_use]
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        let defaults = CoordinatorSettings::default();
        CoordinatorSettings {
            worker_threads: self
                .coordinator
                .worker_threads
                .unwrap_or(defaults.worker_threads)
                .max(1),
            max_concurrent_lazy_loads: self.coordinator.max_concurrent_lazy_loads.max(1),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            log_level: LogLevel::Info,
            cache: CacheConfig::default(),
            coordinator: CoordinatorConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}
