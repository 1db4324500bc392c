//! Load pipeline error types.

use thiserror::Error;

/// Error delivered to every waiter of a failed load.
///
/// Cloneable so one failure can be fanned out to all joined requests and kept
/// inside cached results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum LoadError {
    #[error("fetch failed: {message}")]
    Fetch { message: String },

    #[error("io error: {message}")]
    Io { message: String },

    #[error("decode failed: {message}")]
    Decode { message: String },

    #[error("transform `{transform}` failed: {message}")]
    Transform { transform: String, message: String },

    #[error("region decode failed: {message}")]
    Region { message: String },

    #[error("no region decoder available for {key}")]
    MissingDecoder { key: String },

    #[error("worker task failed: {message}")]
    Worker { message: String },

    #[error("load coordinator has shut down")]
    Shutdown,
}

impl LoadError {
    /// Creates fetch error.
    #[must_use]
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
        }
    }

    /// Creates io error.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates transform error.
    #[must_use]
    pub fn transform(transform: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transform {
            transform: transform.into(),
            message: message.into(),
        }
    }

    /// Creates region error.
    #[must_use]
    pub fn region(message: impl Into<String>) -> Self {
        Self::Region {
            message: message.into(),
        }
    }

    /// Creates worker error.
    #[must_use]
    pub fn worker(message: impl Into<String>) -> Self {
        Self::Worker {
            message: message.into(),
        }
    }

    /// Returns whether a retry could plausibly succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Io { .. })
    }
}

/// A computation failure tagged with its caching policy.
///
/// `Transient` failures reach the waiters but are never cached, so the next
/// request retries. `Terminal` failures are cached as error results so repeated
/// requests fail fast.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadFailure {
    /// Retryable failure, not cached.
    #[error(transparent)]
    Transient(LoadError),
    /// Permanent failure, cached under the computation's key.
    #[error(transparent)]
    Terminal(LoadError),
}

impl LoadFailure {
    /// Returns true if the failure must not be cached.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<LoadError> for LoadFailure {
    fn from(error: LoadError) -> Self {
        Self::Terminal(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_errors_are_terminal() {
        let failure: LoadFailure = LoadError::decode("bad header").into();
        assert!(!failure.is_transient());
        assert_eq!(failure, LoadFailure::Terminal(LoadError::decode("bad header")));
    }

    #[test]
    fn test_transient_tag_survives() {
        let failure = LoadFailure::Transient(LoadError::fetch("timeout"));
        assert!(failure.is_transient());
        assert_eq!(failure.to_string(), "fetch failed: timeout");
    }

    #[test]
    fn test_error_classification() {
        assert!(LoadError::fetch("x").is_transient());
        assert!(LoadError::io("x").is_transient());
        assert!(!LoadError::decode("x").is_transient());
        assert!(!LoadError::Shutdown.is_transient());
    }
}
