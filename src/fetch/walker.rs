//! Redirect and cookie-jar walking.
//!
//! Follows a redirect chain hop by hop within a fixed budget, accumulating
//! `Set-Cookie` records into the request's jar as it goes. Some targets
//! answer with a cookie-setting redirect back to the same URL as an access
//! precondition; one such round is honored, a second one means the target
//! wants a real browser and the walk fails as a bad approach.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, instrument, warn};

use super::attempt::{AttemptResponse, HeaderBlock};
use super::constants::HOP_BUDGET;
use super::cookies::Cookie;
use super::error::FetchError;
use super::options::FetchRequest;
use super::race::RaceCoordinator;
use crate::support::temp::TempAllocator;

/// A fully-materialized response body.
#[derive(Debug)]
pub enum FetchedBody {
    /// Body written to a temp-allocated file.
    File {
        /// Location of the materialized file.
        path: PathBuf,
        /// Decoded size on disk.
        bytes: u64,
    },
    /// Body held in memory.
    Blob(Bytes),
}

impl FetchedBody {
    /// Decoded body length in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        match self {
            Self::File { bytes, .. } => *bytes,
            Self::Blob(blob) => blob.len() as u64,
        }
    }

    /// True when the body carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of a complete walk: terminal status plus the whole hop chain.
#[derive(Debug)]
pub struct WalkedResult {
    /// Terminal status code.
    pub status: u16,
    /// Canonical reason phrase for the terminal status, when one exists.
    pub reason: Option<String>,
    /// One header block per hop, in walk order; the last is the terminal hop.
    pub chain: Vec<HeaderBlock>,
    /// Materialized body, absent when the terminal hop carried none.
    pub body: Option<FetchedBody>,
}

enum Materialize {
    File,
    Blob,
}

/// Walks redirect chains, feeding cookies forward between hops.
pub struct RedirectCookieWalker {
    race: RaceCoordinator,
    temp: Arc<dyn TempAllocator>,
}

impl RedirectCookieWalker {
    /// Creates a walker issuing hops through `race` and materializing file
    /// bodies through `temp`.
    #[must_use]
    pub fn new(race: RaceCoordinator, temp: Arc<dyn TempAllocator>) -> Self {
        Self { race, temp }
    }

    /// Returns the race coordinator in use.
    #[must_use]
    pub fn race(&self) -> &RaceCoordinator {
        &self.race
    }

    /// Returns a handle to the temp allocator in use.
    #[must_use]
    pub fn temp(&self) -> Arc<dyn TempAllocator> {
        Arc::clone(&self.temp)
    }

    /// Walks the chain and writes the terminal body to a temp file.
    ///
    /// # Errors
    ///
    /// Fails on transport errors, an exhausted hop budget, or a repeated
    /// cookie-only redirect round.
    pub async fn fetch_to_file(&self, request: &FetchRequest) -> Result<WalkedResult, FetchError> {
        self.walk(request, &Materialize::File).await
    }

    /// Walks the chain and keeps the terminal body in memory.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`fetch_to_file`](Self::fetch_to_file).
    pub async fn fetch_to_blob(&self, request: &FetchRequest) -> Result<WalkedResult, FetchError> {
        self.walk(request, &Materialize::Blob).await
    }

    #[instrument(level = "debug", skip(self, request, mode), fields(url = %request.url))]
    async fn walk(
        &self,
        request: &FetchRequest,
        mode: &Materialize,
    ) -> Result<WalkedResult, FetchError> {
        let origin_url = request.url.clone();
        let mut current = request.clone();
        let mut chain: Vec<HeaderBlock> = Vec::new();
        let mut budget = HOP_BUDGET;
        let mut cookie_redirects: u32 = 0;

        loop {
            let response = self.race.fetch(&current).await?;
            let AttemptResponse {
                status,
                reason,
                headers,
                body,
            } = response;
            chain.extend(headers);

            let Some(hop) = chain.last() else {
                return Err(FetchError::unclassified(
                    current.url.as_str(),
                    "attempt produced no header block",
                ));
            };
            if !super::attempt::is_redirect_status(status) {
                let body = match (body, mode) {
                    (None, _) => None,
                    (Some(payload), Materialize::Blob) => {
                        Some(FetchedBody::Blob(payload.into_bytes().await?))
                    }
                    (Some(payload), Materialize::File) => {
                        let path = self.temp.allocate().map_err(|error| {
                            FetchError::unclassified(
                                current.url.as_str(),
                                format!("failed to allocate temp file: {error}"),
                            )
                        })?;
                        let bytes = payload.into_file(&path).await?;
                        self.temp.bind(&path);
                        Some(FetchedBody::File { path, bytes })
                    }
                };
                return Ok(WalkedResult {
                    status,
                    reason,
                    chain,
                    body,
                });
            }

            let location = hop.get("location").map(str::to_string);
            let set_cookies: Vec<_> = hop
                .get_all("set-cookie")
                .into_iter()
                .filter_map(Cookie::parse_set_cookie)
                .collect();
            let had_cookies = !set_cookies.is_empty();
            if had_cookies {
                debug!(count = set_cookies.len(), url = %current.url, "redirect set cookies");
                current.cookies.extend(set_cookies);
            }

            match location {
                None if !had_cookies => {
                    // A bare redirect with nowhere to go; hand it back as the
                    // terminal answer.
                    warn!(status, url = %current.url, "redirect carried no location");
                    return Ok(WalkedResult {
                        status,
                        reason,
                        chain,
                        body: None,
                    });
                }
                None => {
                    cookie_redirects += 1;
                    if cookie_redirects > 1 {
                        // Errors name the URL the caller asked for, not the
                        // hop the walk happened to stop on.
                        return Err(FetchError::bad_approach(
                            origin_url.as_str(),
                            "browser required to solve complex cookie preconditions",
                        ));
                    }
                    debug!(url = %current.url, "cookie-only redirect, retrying same url");
                    // Same URL again, now with the fresh cookies attached.
                }
                Some(location) => {
                    let next = current.url.join(&location).map_err(|error| {
                        FetchError::unclassified(
                            current.url.as_str(),
                            format!("invalid redirect location {location:?}: {error}"),
                        )
                    })?;
                    debug!(from = %current.url, to = %next, status, "following redirect");
                    current = current.for_hop(next);
                }
            }

            budget -= 1;
            if budget == 0 {
                return Err(FetchError::bad_attempt(
                    origin_url.as_str(),
                    "too many redirections",
                ));
            }
        }
    }
}
