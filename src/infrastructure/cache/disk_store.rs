//! Disk store for deep-zoom backing files.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use crate::domain::entities::CacheKey;
use crate::domain::errors::LoadError;
use crate::domain::ports::FileStore;

/// Maximum store size in bytes (500 MB default).
pub const DEFAULT_MAX_STORE_SIZE: u64 = 500 * 1024 * 1024;

const FILE_EXTENSION: &str = "img";

/// Stores fetched source files under a digest of their cache key.
///
/// Total size is tracked as files are committed. When it exceeds the limit the
/// least recently accessed files are removed until usage drops below 90%.
pub struct DiskFileStore {
    dir: PathBuf,
    max_size: u64,
    current_size: AtomicU64,
    item_count: AtomicUsize,
}

impl DiskFileStore {
    /// Opens a store in `dir`, creating it if needed.
    ///
    /// # Errors
    /// Returns an io error if the directory cannot be created or read.
    pub async fn new(dir: PathBuf, max_size: u64) -> Result<Self, LoadError> {
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| LoadError::io(format!("Failed to create store dir: {e}")))?;

        let mut total_size = 0u64;
        let mut count = 0usize;
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| LoadError::io(format!("Failed to read store dir: {e}")))?;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == FILE_EXTENSION)
                && let Ok(meta) = entry.metadata().await
            {
                total_size += meta.len();
                count += 1;
            }
        }

        debug!(dir = %dir.display(), files = count, size = total_size, "Opened disk store");
        let store = Self {
            dir,
            max_size,
            current_size: AtomicU64::new(total_size),
            item_count: AtomicUsize::new(count),
        };
        store.cleanup_if_needed().await;
        Ok(store)
    }

    /// Removes the file for `key`.
    pub async fn evict(&self, key: &CacheKey) {
        let path = self.path_for(key);
        let size = fs::metadata(&path).await.map(|m| m.len()).ok();
        if let Err(e) = fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(key = %key, error = %e, "Failed to evict from disk store");
            }
        } else if let Some(s) = size {
            self.current_size.fetch_sub(s, Ordering::Relaxed);
            self.item_count.fetch_sub(1, Ordering::Relaxed);
            debug!(key = %key, "Evicted from disk store");
        }
    }

    /// Removes every stored file.
    ///
    /// # Errors
    /// Returns an io error if the directory cannot be read.
    pub async fn clear(&self) -> Result<(), LoadError> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| LoadError::io(format!("Failed to read store dir: {e}")))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LoadError::io(format!("Failed to read entry: {e}")))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == FILE_EXTENSION)
                && fs::remove_file(&path).await.is_err()
            {
                warn!(path = %path.display(), "Failed to remove stored file");
            }
        }
        self.current_size.store(0, Ordering::Relaxed);
        self.item_count.store(0, Ordering::Relaxed);
        debug!("Cleared disk store");
        Ok(())
    }

    /// Bytes currently stored.
    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    /// Number of stored files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.item_count.load(Ordering::Relaxed)
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn cleanup_if_needed(&self) {
        let current_size = self.current_size();
        if current_size <= self.max_size {
            return;
        }

        debug!(
            current_size = current_size,
            max_size = self.max_size,
            "Disk store over limit, cleaning up"
        );

        let Ok(mut entries) = fs::read_dir(&self.dir).await else {
            return;
        };

        let mut files: Vec<(PathBuf, SystemTime, u64)> = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != FILE_EXTENSION) {
                continue;
            }
            if let Ok(meta) = entry.metadata().await {
                let accessed = meta
                    .accessed()
                    .or_else(|_| meta.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                files.push((path, accessed, meta.len()));
            }
        }

        files.sort_by_key(|(_, time, _)| *time);

        let mut freed_size = 0u64;
        let mut freed_count = 0usize;
        let target = current_size - self.max_size + (self.max_size / 10);

        for (path, _, size) in files {
            if freed_size >= target {
                break;
            }
            if let Err(e) = fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to remove old file");
            } else {
                debug!(path = %path.display(), "Removed old file");
                freed_size += size;
                freed_count += 1;
            }
        }
        self.current_size.fetch_sub(freed_size, Ordering::Relaxed);
        self.item_count.fetch_sub(freed_count, Ordering::Relaxed);

        debug!(
            freed_size = freed_size,
            freed_count = freed_count,
            "Disk store cleanup complete"
        );
    }
}

#[async_trait]
impl FileStore for DiskFileStore {
    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.{FILE_EXTENSION}", key.digest()))
    }

    async fn contains(&self, key: &CacheKey) -> bool {
        fs::try_exists(self.path_for(key)).await.unwrap_or(false)
    }

    async fn commit(&self, key: &CacheKey) -> Result<(), LoadError> {
        let path = self.path_for(key);
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| LoadError::io(format!("Failed to stat {}: {e}", path.display())))?;

        self.current_size.fetch_add(meta.len(), Ordering::Relaxed);
        self.item_count.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, path = %path.display(), size = meta.len(), "Committed file to disk store");

        self.cleanup_if_needed().await;
        Ok(())
    }
}

/// Returns the default store directory path.
#[must_use]
pub fn default_store_path() -> PathBuf {
    directories::ProjectDirs::from("com", "linuxmobile", "imgflight").map_or_else(
        || std::env::temp_dir().join("imgflight").join("cache").join("files"),
        |dirs| dirs.cache_dir().join("files"),
    )
}
