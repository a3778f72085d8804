//! Fetch request options.

use std::time::Duration;

use url::Url;

use super::constants::DEFAULT_TIMEOUT;
use super::cookies::Cookie;

/// One logical fetch request.
///
/// Immutable per attempt; the redirect walker builds a derived copy for each
/// hop (new URL, grown cookie set). Extra header keys are lower-cased
/// internally so overrides match case-insensitively.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Target URL.
    pub url: Url,
    /// HTTP method, upper-cased at send time. Defaults to GET.
    pub method: String,
    /// Optional request body.
    pub body: Option<Vec<u8>>,
    /// Caller-supplied headers, keys lower-cased. Same-named impersonation
    /// mixin headers are overridden; everything else passes through.
    pub extra_headers: Vec<(String, String)>,
    /// Cookie set carried across hops.
    pub cookies: Vec<Cookie>,
    /// Optional referer, applied unless the caller set a `referer` header.
    pub referer: Option<String>,
    /// Optional User-Agent override, applied unless the caller set one.
    pub user_agent: Option<String>,
    /// Optional proxy for the transport.
    pub proxy_url: Option<Url>,
    /// Total per-attempt timeout.
    pub timeout: Duration,
}

impl FetchRequest {
    /// Creates a GET request for `url` with default options.
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            method: "GET".to_string(),
            body: None,
            extra_headers: Vec::new(),
            cookies: Vec::new(),
            referer: None,
            user_agent: None,
            proxy_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Adds or replaces an extra header; the name is lower-cased.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let key = name.to_lowercase();
        let value = value.into();
        if let Some(slot) = self.extra_headers.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.extra_headers.push((key, value));
        }
        self
    }

    /// Sets the cookie set carried into the first hop.
    #[must_use]
    pub fn with_cookies(mut self, cookies: Vec<Cookie>) -> Self {
        self.cookies = cookies;
        self
    }

    /// Sets the referer.
    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Sets a User-Agent override for this request only.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the proxy URL for the transport.
    #[must_use]
    pub fn with_proxy(mut self, proxy_url: Url) -> Self {
        self.proxy_url = Some(proxy_url);
        self
    }

    /// Sets the total per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the extra header value for `name`, if the caller set one.
    #[must_use]
    pub fn extra_header(&self, name: &str) -> Option<&str> {
        let key = name.to_lowercase();
        self.extra_headers
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Builds the request for the next redirect hop.
    pub(crate) fn for_hop(&self, url: Url) -> Self {
        let mut next = self.clone();
        next.url = url;
        next
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let request = FetchRequest::new(Url::parse("https://example.com/").unwrap());
        assert_eq!(request.method, "GET");
        assert_eq!(request.timeout, DEFAULT_TIMEOUT);
        assert!(request.body.is_none());
        assert!(request.extra_headers.is_empty());
    }

    #[test]
    fn test_header_keys_lowercased_and_replaced() {
        let request = FetchRequest::new(Url::parse("https://example.com/").unwrap())
            .with_header("Accept-Language", "fr-FR")
            .with_header("ACCEPT-LANGUAGE", "de-DE");
        assert_eq!(request.extra_headers.len(), 1);
        assert_eq!(request.extra_header("accept-language"), Some("de-DE"));
        assert_eq!(request.extra_header("Accept-Language"), Some("de-DE"));
    }

    #[test]
    fn test_for_hop_keeps_options() {
        let request = FetchRequest::new(Url::parse("https://example.com/a").unwrap())
            .with_referer("https://example.com/")
            .with_header("x-custom", "1");
        let next = request.for_hop(Url::parse("https://example.com/b").unwrap());
        assert_eq!(next.url.path(), "/b");
        assert_eq!(next.referer.as_deref(), Some("https://example.com/"));
        assert_eq!(next.extra_header("x-custom"), Some("1"));
    }
}
