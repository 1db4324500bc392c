//! Port definition for locally persisted source files.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::entities::CacheKey;
use crate::domain::errors::LoadError;

/// Local files backing deep-zoom region decoders.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Path where the file for `key` lives or will be written.
    fn path_for(&self, key: &CacheKey) -> PathBuf;

    /// Returns true if a complete file for `key` exists.
    async fn contains(&self, key: &CacheKey) -> bool;

    /// Records a newly written file, evicting older files if over capacity.
    async fn commit(&self, key: &CacheKey) -> Result<(), LoadError>;
}
