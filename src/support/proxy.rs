//! Proxy allocation seam.
//!
//! The fetch layer never picks proxies itself; callers hand a proxy URL into
//! the request options. This trait is the seam a pool implementation plugs
//! into when attempts need geo-targeted egress.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Errors from proxy allocation.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No proxy is available for the requested country.
    #[error("no proxy available for country {country:?}")]
    Unavailable {
        /// Country requested by the caller, if any.
        country: Option<String>,
    },
    /// The configured proxy endpoint is not a valid URL.
    #[error("invalid proxy endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        /// The offending endpoint string.
        endpoint: String,
        /// What made it invalid.
        reason: String,
    },
}

/// Hands out proxy URLs for outbound attempts.
#[async_trait]
pub trait ProxyAllocator: Send + Sync {
    /// Allocates a proxy, optionally pinned to a country code.
    async fn allocate(&self, country: Option<&str>) -> Result<Url, ProxyError>;
}

/// Allocator that always returns the same proxy endpoint.
#[derive(Debug, Clone)]
pub struct StaticProxyAllocator {
    endpoint: Url,
}

impl StaticProxyAllocator {
    /// Wraps a fixed proxy endpoint.
    #[must_use]
    pub fn new(endpoint: Url) -> Self {
        Self { endpoint }
    }

    /// Parses and wraps a fixed proxy endpoint.
    ///
    /// # Errors
    ///
    /// Fails when `endpoint` is not a valid URL.
    pub fn from_str(endpoint: &str) -> Result<Self, ProxyError> {
        Url::parse(endpoint)
            .map(Self::new)
            .map_err(|error| ProxyError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: error.to_string(),
            })
    }
}

#[async_trait]
impl ProxyAllocator for StaticProxyAllocator {
    async fn allocate(&self, _country: Option<&str>) -> Result<Url, ProxyError> {
        Ok(self.endpoint.clone())
    }
}
