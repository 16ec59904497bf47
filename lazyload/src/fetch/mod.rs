//! Resource fetching.
//!
//! The engine fetches through the [`Fetcher`] trait so hosts can plug in their
//! own loader (an image decoder, a platform network stack) and tests can
//! script outcomes. [`HttpFetcher`] is the bundled `reqwest` implementation.

mod http;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

pub use http::{HttpFetcher, DEFAULT_FETCH_TIMEOUT_SECS};

use crate::error::FetchError;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A successfully fetched resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    pub url: String,
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

impl FetchedResource {
    pub fn new(url: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            bytes: bytes.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Asynchronous resource loader.
///
/// Implementations must be cheap to call concurrently; the manager issues at
/// most one primary fetch per listener but many listeners fetch at once.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<FetchedResource, FetchError>>;
}

/// Decode an inline `data:` URI without touching the network.
///
/// Only the base64 flag is recognized; the payload is returned undecoded
/// since the engine never inspects bytes.
pub fn fetch_data_uri(url: &str) -> Option<FetchedResource> {
    let rest = url.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let media_type = meta.trim_end_matches(";base64");

    let mut resource = FetchedResource::new(url, Bytes::copy_from_slice(payload.as_bytes()));
    if !media_type.is_empty() {
        resource = resource.with_content_type(media_type);
    }
    Some(resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_RESOURCE;

    #[test]
    fn test_data_uri_resolves_inline() {
        let resource = fetch_data_uri(DEFAULT_RESOURCE).unwrap();
        assert_eq!(resource.content_type.as_deref(), Some("image/gif"));
        assert!(!resource.bytes.is_empty());
    }

    #[test]
    fn test_non_data_uri_is_none() {
        assert!(fetch_data_uri("https://example.com/a.png").is_none());
        assert!(fetch_data_uri("data:missing-comma").is_none());
    }
}
