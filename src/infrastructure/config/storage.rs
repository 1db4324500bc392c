//! Locating and reading `config.toml`.

use super::app_config::AppConfig;
use directories::ProjectDirs;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "linuxmobile";
const APP_NAME: &str = "imgflight";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Failure to locate or write the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform has no configuration directory.
    #[error("failed to determine config directory")]
    ConfigDirNotFound,
    /// Reading or writing the file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The default configuration could not be serialized.
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Owns the location of the configuration file.
#[derive(Debug, Clone)]
pub struct StorageManager {
    config_path: PathBuf,
}

impl StorageManager {
    /// Uses `config.toml` in the platform configuration directory.
    ///
    /// # Errors
    /// Returns [`ConfigError::ConfigDirNotFound`] if the platform has no
    /// configuration directory.
    pub fn new() -> Result<Self, ConfigError> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| Self::at(dirs.config_dir().join(CONFIG_FILE_NAME)))
            .ok_or(ConfigError::ConfigDirNotFound)
    }

    /// Uses the file at `config_path`.
    #[must_use]
    pub fn at(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Uses `path_override` when given, the platform location otherwise.
    ///
    /// # Errors
    /// Same as [`StorageManager::new`].
    pub fn resolve(path_override: Option<&Path>) -> Result<Self, ConfigError> {
        path_override.map_or_else(Self::new, |path| Ok(Self::at(path)))
    }

    /// Reads the configuration.
    ///
    /// A missing file is created with defaults. A file that fails to parse is
    /// left untouched and defaults are returned.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read or the default file
    /// cannot be written.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.config_path.exists() {
            info!(path = %self.config_path.display(), "Config file not found, writing defaults");
            let config = AppConfig::default();
            write_atomic(&self.config_path, &toml::to_string_pretty(&config)?)?;
            return Ok(config);
        }

        let content = fs::read_to_string(&self.config_path)?;
        toml::from_str::<AppConfig>(&content).map_or_else(
            |e| {
                warn!(path = %self.config_path.display(), error = %e, "Invalid config file, using defaults");
                Ok(AppConfig::default())
            },
            |config| {
                debug!(path = %self.config_path.display(), "Loaded config");
                Ok(config)
            },
        )
    }
}

/// Replaces `path` with `contents` through a temporary file in the same
/// directory, creating the directory if needed.
fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
    temp_file.write_all(contents.as_bytes())?;
    temp_file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::LogLevel;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let manager = StorageManager::at(&path);

        let config = manager.load().unwrap();
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(path.exists());

        let reloaded = manager.load().unwrap();
        assert_eq!(reloaded.cache.memory_capacity, config.cache.memory_capacity);
    }

    #[test]
    fn test_malformed_file_falls_back_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "invalid_toml = [").unwrap();

        let config = StorageManager::at(&path).load().unwrap();

        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(fs::read_to_string(&path).unwrap(), "invalid_toml = [");
    }

    #[test]
    fn test_override_path_is_used() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "log_level = \"warn\"\n[network]\ntimeout_secs = 3\n").unwrap();

        let config = StorageManager::resolve(Some(&path)).unwrap().load().unwrap();

        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.network.timeout_secs, 3);
    }

    #[test]
    fn test_atomic_write_leaves_only_target() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        write_atomic(&path, "a = 1\n").unwrap();
        write_atomic(&path, "a = 2\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "a = 2\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
