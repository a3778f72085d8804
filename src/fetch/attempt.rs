//! Single-attempt request execution.
//!
//! Exactly one HTTP request to one URL with one set of options. Redirects are
//! never followed here (the walker decides the next hop), TLS peer
//! verification is off because the impersonated fingerprint requires it, and
//! the response body is exposed as a lazily-drained [`Payload`] that applies
//! content decoding, a throughput floor, and a size cap as it is consumed.

use std::fmt;
use std::path::Path;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::time::{Instant, timeout};
use tracing::{debug, instrument};
use url::Url;

use super::classify::{TransportErrorKind, classify_reqwest_error, digest_transport_error};
use super::constants::{
    CONNECT_TIMEOUT, MAX_RESPONSE_BYTES, THROUGHPUT_FLOOR_BYTES, THROUGHPUT_WINDOW,
};
use super::cookies::cookie_header;
use super::error::FetchError;
use super::impersonate::ImpersonationProfile;
use super::options::FetchRequest;

/// Status codes treated as redirects by this layer.
pub const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// Returns true for the redirect statuses the walker acts on.
#[must_use]
pub fn is_redirect_status(status: u16) -> bool {
    REDIRECT_STATUSES.contains(&status)
}

/// One hop's response headers, keyed case-insensitively (names lower-cased).
#[derive(Debug, Clone, Serialize)]
pub struct HeaderBlock {
    /// Status code observed on this hop.
    pub status: u16,
    /// Canonical reason phrase for the status, when one exists.
    pub reason: Option<String>,
    fields: Vec<(String, String)>,
}

impl HeaderBlock {
    /// Creates an empty block for a hop with the given status line.
    #[must_use]
    pub fn new(status: u16, reason: Option<String>) -> Self {
        Self {
            status,
            reason,
            fields: Vec::new(),
        }
    }

    /// Appends a header field; the name is lower-cased.
    pub fn push(&mut self, name: &str, value: impl Into<String>) {
        self.fields.push((name.to_lowercase(), value.into()));
    }

    /// Returns the first value for `name` (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        let key = name.to_lowercase();
        self.fields
            .iter()
            .find(|(field, _)| *field == key)
            .map(|(_, value)| value.as_str())
    }

    /// Returns every value for `name` (case-insensitive), in order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        let key = name.to_lowercase();
        self.fields
            .iter()
            .filter(|(field, _)| *field == key)
            .map(|(_, value)| value.as_str())
            .collect()
    }

    /// All fields in wire order.
    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

/// One attempt's outcome: status line, header blocks, optional body.
///
/// Redirect responses carry no body; the walker decides the next hop.
#[derive(Debug)]
pub struct AttemptResponse {
    /// Terminal status code of this attempt.
    pub status: u16,
    /// Canonical reason phrase, when one exists.
    pub reason: Option<String>,
    /// Per-hop header blocks; a single attempt produces exactly one.
    pub headers: Vec<HeaderBlock>,
    /// Lazily-drained decoded body, absent for redirects.
    pub body: Option<Payload>,
}

impl AttemptResponse {
    /// Returns the terminal hop's header block.
    #[must_use]
    pub fn last_headers(&self) -> Option<&HeaderBlock> {
        self.headers.last()
    }
}

enum PayloadInner {
    Stream(BoxStream<'static, reqwest::Result<Bytes>>),
    Buffered(Bytes),
}

/// A response body that decodes as it is drained.
///
/// Draining enforces the throughput floor (stalled transfers fail as
/// timeouts) and the raw size cap, then runs the bytes through the decoder
/// selected from `Content-Encoding`.
pub struct Payload {
    inner: PayloadInner,
    encoding: String,
    url: Url,
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.inner {
            PayloadInner::Stream(_) => "stream".to_string(),
            PayloadInner::Buffered(bytes) => format!("buffered({} bytes)", bytes.len()),
        };
        f.debug_struct("Payload")
            .field("state", &state)
            .field("encoding", &self.encoding)
            .field("url", &self.url.as_str())
            .finish()
    }
}

impl Payload {
    pub(crate) fn from_stream(
        stream: BoxStream<'static, reqwest::Result<Bytes>>,
        encoding: impl Into<String>,
        url: Url,
    ) -> Self {
        Self {
            inner: PayloadInner::Stream(stream),
            encoding: encoding.into(),
            url,
        }
    }

    /// Wraps already-decoded bytes as a readable payload.
    #[must_use]
    pub fn buffered(bytes: impl Into<Bytes>, url: Url) -> Self {
        Self {
            inner: PayloadInner::Buffered(bytes.into()),
            encoding: String::new(),
            url,
        }
    }

    /// Drains the payload fully into memory, decoding along the way.
    ///
    /// # Errors
    ///
    /// Returns a classified transport error when the stream fails, a
    /// bad-approach timeout when throughput stays below the floor for a full
    /// window, and an unclassified error for decode failures or the size cap.
    pub async fn into_bytes(self) -> Result<Bytes, FetchError> {
        let url = self.url;
        match self.inner {
            PayloadInner::Buffered(bytes) => {
                if self.encoding.is_empty() {
                    return Ok(bytes);
                }
                let mut decoder = super::decode::ContentDecoder::for_encoding(&self.encoding);
                decoder
                    .write(&bytes)
                    .and_then(|()| decoder.finish())
                    .map(Bytes::from)
                    .map_err(|error| decode_error(&url, &error))
            }
            PayloadInner::Stream(mut stream) => {
                let mut decoder = super::decode::ContentDecoder::for_encoding(&self.encoding);
                let mut guard = DrainGuard::new();
                loop {
                    match timeout(guard.remaining(), stream.next()).await {
                        Ok(Some(Ok(chunk))) => {
                            guard.on_chunk(chunk.len() as u64, &url)?;
                            decoder
                                .write(&chunk)
                                .map_err(|error| decode_error(&url, &error))?;
                        }
                        Ok(Some(Err(error))) => return Err(classify_reqwest_error(&url, error)),
                        Ok(None) => break,
                        Err(_) => guard.on_idle(&url)?,
                    }
                }
                decoder
                    .finish()
                    .map(Bytes::from)
                    .map_err(|error| decode_error(&url, &error))
            }
        }
    }

    /// Drains the payload into a file at `path`, returning the decoded size.
    ///
    /// Unencoded streams go straight to disk; encoded bodies are decoded in
    /// memory first.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`into_bytes`](Self::into_bytes), plus an
    /// unclassified error for local I/O failures.
    pub async fn into_file(self, path: &Path) -> Result<u64, FetchError> {
        let url = self.url.clone();
        let direct = matches!(&self.inner, PayloadInner::Stream(_))
            && super::decode::ContentDecoder::for_encoding(&self.encoding).is_identity();
        if !direct {
            let decoded = self.into_bytes().await?;
            tokio::fs::write(path, &decoded)
                .await
                .map_err(|error| io_error(&url, path, &error))?;
            return Ok(decoded.len() as u64);
        }

        let PayloadInner::Stream(mut stream) = self.inner else {
            // Unreachable: `direct` requires the stream variant.
            return Err(FetchError::unclassified(url.as_str(), "payload state"));
        };
        let file = File::create(path)
            .await
            .map_err(|error| io_error(&url, path, &error))?;
        let mut writer = BufWriter::new(file);
        let mut guard = DrainGuard::new();
        let mut written: u64 = 0;
        loop {
            match timeout(guard.remaining(), stream.next()).await {
                Ok(Some(Ok(chunk))) => {
                    guard.on_chunk(chunk.len() as u64, &url)?;
                    writer
                        .write_all(&chunk)
                        .await
                        .map_err(|error| io_error(&url, path, &error))?;
                    written += chunk.len() as u64;
                }
                Ok(Some(Err(error))) => return Err(classify_reqwest_error(&url, error)),
                Ok(None) => break,
                Err(_) => guard.on_idle(&url)?,
            }
        }
        writer
            .flush()
            .await
            .map_err(|error| io_error(&url, path, &error))?;
        Ok(written)
    }

    async fn discard(self) {
        if let PayloadInner::Stream(mut stream) = self.inner {
            // The per-attempt total timeout bounds this loop.
            while let Some(item) = stream.next().await {
                if item.is_err() {
                    break;
                }
            }
        }
    }
}

/// Throughput-floor and size-cap accounting over a raw body drain.
struct DrainGuard {
    window_start: Instant,
    window_bytes: u64,
    total_bytes: u64,
}

impl DrainGuard {
    fn new() -> Self {
        Self {
            window_start: Instant::now(),
            window_bytes: 0,
            total_bytes: 0,
        }
    }

    fn remaining(&self) -> std::time::Duration {
        THROUGHPUT_WINDOW.saturating_sub(self.window_start.elapsed())
    }

    fn on_chunk(&mut self, len: u64, url: &Url) -> Result<(), FetchError> {
        self.total_bytes += len;
        if self.total_bytes > MAX_RESPONSE_BYTES {
            return Err(FetchError::unclassified(
                url.as_str(),
                "response exceeded the maximum size cap",
            ));
        }
        self.window_bytes += len;
        if self.window_start.elapsed() >= THROUGHPUT_WINDOW {
            if self.window_bytes < THROUGHPUT_FLOOR_BYTES {
                return Err(stalled(url));
            }
            self.window_start = Instant::now();
            self.window_bytes = 0;
        }
        Ok(())
    }

    fn on_idle(&mut self, url: &Url) -> Result<(), FetchError> {
        if self.window_bytes < THROUGHPUT_FLOOR_BYTES {
            return Err(stalled(url));
        }
        self.window_start = Instant::now();
        self.window_bytes = 0;
        Ok(())
    }
}

fn stalled(url: &Url) -> FetchError {
    digest_transport_error(
        url,
        TransportErrorKind::Timeout,
        "transfer stalled below the minimum throughput floor",
    )
}

fn decode_error(url: &Url, error: &std::io::Error) -> FetchError {
    FetchError::unclassified(url.as_str(), format!("failed to decode body: {error}"))
}

fn io_error(url: &Url, path: &Path, error: &std::io::Error) -> FetchError {
    FetchError::unclassified(
        url.as_str(),
        format!("io error writing {}: {error}", path.display()),
    )
}

/// Executes exactly one HTTP request with the impersonated header set.
#[derive(Debug, Clone)]
pub struct SingleAttemptFetcher {
    profile: ImpersonationProfile,
}

impl Default for SingleAttemptFetcher {
    fn default() -> Self {
        Self::new(ImpersonationProfile::default())
    }
}

impl SingleAttemptFetcher {
    /// Creates a fetcher dressing requests with `profile`.
    #[must_use]
    pub fn new(profile: ImpersonationProfile) -> Self {
        Self { profile }
    }

    /// Returns the impersonation profile in use.
    #[must_use]
    pub fn profile(&self) -> &ImpersonationProfile {
        &self.profile
    }

    /// Performs one attempt for `request`.
    ///
    /// Redirect statuses resolve with no payload (body drained and
    /// discarded); everything else resolves with a lazily-decoded payload.
    ///
    /// # Errors
    ///
    /// Transport failures are classified through the taxonomy table; no
    /// partial success is ever returned.
    #[instrument(level = "debug", skip(self, request), fields(url = %request.url))]
    pub async fn fetch(&self, request: &FetchRequest) -> Result<AttemptResponse, FetchError> {
        if !matches!(request.url.scheme(), "http" | "https") {
            return Err(digest_transport_error(
                &request.url,
                TransportErrorKind::UnsupportedScheme,
                &format!("unsupported url scheme {:?}", request.url.scheme()),
            ));
        }

        let client = self.build_client(request)?;
        let method = reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| {
                FetchError::unclassified(
                    request.url.as_str(),
                    format!("invalid HTTP method {:?}", request.method),
                )
            })?;

        let mut builder = client.request(method, request.url.clone());
        for (name, value) in self.assemble_headers(request) {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|error| classify_reqwest_error(&request.url, error))?;

        let status = response.status();
        let reason = status.canonical_reason().map(str::to_string);
        let mut block = HeaderBlock::new(status.as_u16(), reason.clone());
        for (name, value) in response.headers() {
            block.push(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }
        let content_encoding = block
            .get("content-encoding")
            .unwrap_or_default()
            .to_lowercase();
        debug!(status = status.as_u16(), url = %request.url, "attempt settled");

        let stream = response.bytes_stream().boxed();
        if is_redirect_status(status.as_u16()) {
            // The walker decides the next hop; this body is noise.
            Payload::from_stream(stream, "", request.url.clone())
                .discard()
                .await;
            return Ok(AttemptResponse {
                status: status.as_u16(),
                reason,
                headers: vec![block],
                body: None,
            });
        }

        Ok(AttemptResponse {
            status: status.as_u16(),
            reason,
            headers: vec![block],
            body: Some(Payload::from_stream(
                stream,
                content_encoding,
                request.url.clone(),
            )),
        })
    }

    fn build_client(&self, request: &FetchRequest) -> Result<reqwest::Client, FetchError> {
        // A client per attempt: proxy and TLS flags are client-scoped, and
        // attempts for the same hop may carry different transport options.
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(true)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(request.timeout)
            .no_gzip();
        if let Some(proxy_url) = &request.proxy_url {
            let proxy = reqwest::Proxy::all(proxy_url.as_str())
                .map_err(|error| classify_reqwest_error(&request.url, error))?;
            builder = builder.proxy(proxy);
        }
        builder
            .build()
            .map_err(|error| classify_reqwest_error(&request.url, error))
    }

    /// Builds the effective header list: caller extras, then jar cookie /
    /// referer / UA override when the caller did not set them explicitly,
    /// merged through the impersonation mixin.
    fn assemble_headers(&self, request: &FetchRequest) -> Vec<(String, String)> {
        let mut extra = request.extra_headers.clone();
        let has = |extra: &[(String, String)], key: &str| extra.iter().any(|(name, _)| name == key);

        if !request.cookies.is_empty() && !has(&extra, "cookie") {
            if let Some(header) = cookie_header(&request.cookies, &request.url) {
                extra.push(("cookie".to_string(), header));
            }
        }
        if let Some(referer) = &request.referer {
            if !has(&extra, "referer") {
                extra.push(("referer".to_string(), referer.clone()));
            }
        }
        if let Some(user_agent) = &request.user_agent {
            if !has(&extra, "user-agent") {
                extra.push(("user-agent".to_string(), user_agent.clone()));
            }
        }
        self.profile.merge_headers(&extra)
    }
}
