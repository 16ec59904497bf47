//! HTTP fetcher backed by `reqwest`.

use std::time::Duration;

use super::{fetch_data_uri, BoxFuture, FetchedResource, Fetcher};
use crate::error::FetchError;

/// Default request timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Fetches resources over HTTP(S). `data:` URIs resolve locally.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    require_image: bool,
}

impl HttpFetcher {
    /// Creates a fetcher with the default timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS))
    }

    /// Creates a fetcher with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            require_image: false,
        })
    }

    /// Reject responses whose content type is not `image/*`.
    pub fn require_image(mut self, require: bool) -> Self {
        self.require_image = require;
        self
    }

    async fn get(&self, url: &str) -> Result<FetchedResource, FetchError> {
        if url.is_empty() {
            return Err(FetchError::MissingSource);
        }
        if let Some(inline) = fetch_data_uri(url) {
            return Ok(inline);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if self.require_image && !content_type.as_deref().is_some_and(|ct| ct.starts_with("image/")) {
            return Err(FetchError::Decode(format!(
                "unexpected content type {:?} from {}",
                content_type, url
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(format!("Failed to read response: {}", e)))?;

        tracing::debug!(url = %url, bytes = bytes.len(), "Fetched resource");

        Ok(FetchedResource {
            url: url.to_string(),
            bytes,
            content_type,
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<FetchedResource, FetchError>> {
        Box::pin(self.get(url))
    }
}
