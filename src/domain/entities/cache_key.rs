//! Cache key construction.
//!
//! Every artifact the coordinator produces is addressed by a [`CacheKey`]. Keys are
//! built incrementally: a decode key names the source and its sampling, and each
//! applied transform, region or lazy marker extends it deterministically.

use std::fmt;

use super::Rect;

/// Opaque identifier of a cacheable artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Creates a key from any string-like input.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Builds the decode key for a source sampled to a target size.
    ///
    /// A zero target leaves the source key unchanged apart from flag suffixes.
    #[must_use]
    pub fn decode(
        source_key: &str,
        sample_width: u32,
        sample_height: u32,
        deep_zoom: bool,
        animate: bool,
    ) -> Self {
        let mut key = String::from(source_key);
        if sample_width > 0 || sample_height > 0 {
            key.push_str(&format!("@{sample_width}x{sample_height}"));
        }
        if deep_zoom {
            key.push_str("#deepzoom");
        }
        if animate {
            key.push_str("#animate");
        }
        Self(key)
    }

    /// Extends this key with one transform identity.
    ///
    /// Applying `a` then `b` yields a different key than `b` then `a`.
    #[must_use]
    pub fn with_transform(&self, transform_key: &str) -> Self {
        Self(format!("{}:{transform_key}", self.0))
    }

    /// Extends this key with a region rectangle and sample size.
    #[must_use]
    pub fn with_region(&self, region: Rect, sample_size: u32) -> Self {
        Self(format!(
            "{}#region({},{},{},{})@{sample_size}",
            self.0,
            region.left,
            region.top,
            region.right(),
            region.bottom()
        ))
    }

    /// Prefixes this key with a lazy-load priority id.
    #[must_use]
    pub fn lazy(&self, priority: u64) -> Self {
        Self(format!("lazy({priority}):{}", self.0))
    }

    /// Returns true if this key was produced by [`CacheKey::lazy`].
    #[must_use]
    pub fn is_lazy(&self) -> bool {
        self.0.starts_with("lazy(")
    }

    /// Returns a filesystem-safe digest of the key.
    #[must_use]
    pub fn digest(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..16])
    }

    /// Returns the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, 0, false, false, "img:a" ; "bare")]
    #[test_case(100, 50, false, false, "img:a@100x50" ; "sampled")]
    #[test_case(0, 0, true, false, "img:a#deepzoom" ; "deep_zoom")]
    #[test_case(0, 0, false, true, "img:a#animate" ; "animate")]
    #[test_case(10, 10, true, true, "img:a@10x10#deepzoom#animate" ; "all")]
    fn test_decode_key(width: u32, height: u32, deep_zoom: bool, animate: bool, expected: &str) {
        let key = CacheKey::decode("img:a", width, height, deep_zoom, animate);
        assert_eq!(key.as_str(), expected);
    }

    #[test]
    fn test_transform_order_matters() {
        let base = CacheKey::new("img:a");
        let ab = base.with_transform("a").with_transform("b");
        let ba = base.with_transform("b").with_transform("a");
        assert_ne!(ab, ba);
        assert_eq!(ab.as_str(), "img:a:a:b");
    }

    #[test]
    fn test_region_key() {
        let base = CacheKey::new("img:a");
        let key = base.with_region(Rect::new(10, 20, 30, 40), 2);
        assert_eq!(key.as_str(), "img:a#region(10,20,40,60)@2");
        assert_ne!(key, base.with_region(Rect::new(10, 20, 30, 40), 4));
    }

    #[test]
    fn test_lazy_key() {
        let key = CacheKey::new("img:a").lazy(7);
        assert_eq!(key.as_str(), "lazy(7):img:a");
        assert!(key.is_lazy());
        assert!(!CacheKey::new("img:a").is_lazy());
    }

    #[test]
    fn test_digest_is_stable() {
        let key = CacheKey::new("https://example.com/image.png");
        assert_eq!(key.digest(), key.clone().digest());
        assert_eq!(key.digest().len(), 32);
    }
}
