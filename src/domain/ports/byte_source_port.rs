//! Port definition for fetching encoded image bytes.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::domain::entities::ServedFrom;
use crate::domain::errors::LoadError;

/// Encoded bytes returned by a fetch.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Raw encoded bytes.
    pub bytes: Bytes,
    /// Content type reported by the source.
    pub content_type: Option<String>,
    /// Where the bytes came from.
    pub served_from: ServedFrom,
}

/// Knows how to produce the raw bytes for one request.
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Stable identity of the source, used as the base of every cache key.
    fn source_key(&self) -> String;

    /// Fetches the encoded bytes.
    async fn fetch(&self) -> Result<Fetched, LoadError>;

    /// Fetches the bytes and persists them at `path`.
    ///
    /// The file only appears at `path` once fully written.
    async fn fetch_to_file(&self, path: &Path) -> Result<ServedFrom, LoadError> {
        let fetched = self.fetch().await?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LoadError::io(format!("Failed to create {}: {e}", parent.display())))?;
        }

        let partial = path.with_extension("part");
        tokio::fs::write(&partial, &fetched.bytes)
            .await
            .map_err(|e| LoadError::io(format!("Failed to write {}: {e}", partial.display())))?;
        tokio::fs::rename(&partial, path)
            .await
            .map_err(|e| LoadError::io(format!("Failed to persist {}: {e}", path.display())))?;

        debug!(path = %path.display(), size = fetched.bytes.len(), "Persisted fetched bytes");
        Ok(fetched.served_from)
    }
}
