//! Network byte source.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::entities::ServedFrom;
use crate::domain::errors::LoadError;
use crate::domain::ports::{ByteSource, Fetched};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Builds the HTTP client shared by every [`HttpSource`].
///
/// # Errors
/// Returns a fetch error if the TLS backend cannot be initialized.
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, LoadError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LoadError::fetch(format!("Failed to create HTTP client: {e}")))
}

/// Downloads bytes from a URL.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    /// Creates a source for `url`.
    #[must_use]
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// The URL this source downloads.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ByteSource for HttpSource {
    fn source_key(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<Fetched, LoadError> {
        debug!(url = %self.url, "Downloading image");
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| LoadError::fetch(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(LoadError::fetch(format!(
                "HTTP {}: {}",
                response.status(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| LoadError::fetch(format!("Failed to read body: {e}")))?;

        debug!(url = %self.url, size = bytes.len(), "Downloaded image");
        Ok(Fetched {
            bytes,
            content_type,
            served_from: ServedFrom::Network,
        })
    }
}
