//! Local file byte source.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::trace;

use crate::domain::entities::ServedFrom;
use crate::domain::errors::LoadError;
use crate::domain::ports::{ByteSource, Fetched};

/// Reads bytes from a local path.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Creates a source for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path this source reads.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ByteSource for FileSource {
    fn source_key(&self) -> String {
        format!("file://{}", self.path.display())
    }

    async fn fetch(&self) -> Result<Fetched, LoadError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| LoadError::io(format!("Failed to read {}: {e}", self.path.display())))?;
        trace!(path = %self.path.display(), size = bytes.len(), "Read local file");
        Ok(Fetched {
            bytes: Bytes::from(bytes),
            content_type: None,
            served_from: ServedFrom::LocalFile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fetch_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.bin");
        tokio::fs::write(&path, b"bytes").await.unwrap();

        let fetched = FileSource::new(&path).fetch().await.unwrap();
        assert_eq!(&fetched.bytes[..], b"bytes");
        assert_eq!(fetched.served_from, ServedFrom::LocalFile);
    }

    #[tokio::test]
    async fn test_missing_file_is_transient() {
        let err = FileSource::new("/nonexistent/a.png").fetch().await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_fetch_to_file_persists_copy() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.bin");
        let dst = dir.path().join("nested").join("dst.img");
        tokio::fs::write(&src, b"payload").await.unwrap();

        let served = FileSource::new(&src).fetch_to_file(&dst).await.unwrap();

        assert_eq!(served, ServedFrom::LocalFile);
        assert_eq!(tokio::fs::read(&dst).await.unwrap(), b"payload");
        assert!(!dst.with_extension("part").exists());
    }

    #[test]
    fn test_source_key() {
        assert_eq!(FileSource::new("/tmp/a.png").source_key(), "file:///tmp/a.png");
    }
}
