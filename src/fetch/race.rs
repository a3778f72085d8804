//! Concurrent attempt racing.
//!
//! Hardened targets answer the same request inconsistently, so each hop is
//! issued as several simultaneous attempts and the most useful outcome wins.
//! Scoring prefers clean successes over other successes, successes over
//! redirects, redirects over client errors, and client errors over server
//! errors; ties break toward the longest body.

use futures_util::future::join_all;
use tracing::{debug, instrument, warn};
use url::Url;

use super::attempt::{AttemptResponse, Payload, SingleAttemptFetcher};
use super::constants::race_attempts;
use super::error::FetchError;
use super::options::FetchRequest;

/// Races N identical attempts and keeps the best-scoring response.
#[derive(Debug, Clone)]
pub struct RaceCoordinator {
    fetcher: SingleAttemptFetcher,
    attempts: usize,
}

impl Default for RaceCoordinator {
    fn default() -> Self {
        Self::new(SingleAttemptFetcher::default())
    }
}

impl RaceCoordinator {
    /// Creates a coordinator with the environment-configured attempt count.
    #[must_use]
    pub fn new(fetcher: SingleAttemptFetcher) -> Self {
        Self {
            fetcher,
            attempts: race_attempts(),
        }
    }

    /// Overrides the attempt count; clamped to at least one.
    #[must_use]
    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Returns the single-attempt fetcher driving each racer.
    #[must_use]
    pub fn fetcher(&self) -> &SingleAttemptFetcher {
        &self.fetcher
    }

    /// Returns the configured attempt count.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Issues the race for `request` and returns the winning response.
    ///
    /// # Errors
    ///
    /// When every attempt fails, the last attempt's error (by submission
    /// order) is returned.
    #[instrument(level = "debug", skip(self, request), fields(url = %request.url, attempts = self.attempts))]
    pub async fn fetch(&self, request: &FetchRequest) -> Result<AttemptResponse, FetchError> {
        if self.attempts == 1 {
            return self.fetcher.fetch(request).await;
        }
        let racers = (0..self.attempts).map(|_| self.fetcher.fetch(request));
        let outcomes = join_all(racers).await;
        select_best(outcomes, &request.url).await
    }
}

/// Usefulness score for a settled attempt. Higher wins.
#[must_use]
pub fn score_status(status: u16) -> u32 {
    match status {
        200 => 1000,
        s @ 201..=299 => 900 + u32::from(s - 200),
        s @ 300..=399 => 800 + u32::from(s - 300),
        s @ 400..=499 => 700 + u32::from(s - 400),
        s @ 500..=599 => 600 + u32::from(s - 500),
        s => u32::from(s),
    }
}

/// Picks the winner among settled attempts.
///
/// Ties on score are broken by draining each candidate body and keeping the
/// longest one; the winner's body is re-exposed as a buffered payload.
pub(crate) async fn select_best(
    outcomes: Vec<Result<AttemptResponse, FetchError>>,
    url: &Url,
) -> Result<AttemptResponse, FetchError> {
    let mut last_error = None;
    let mut successes = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(response) => successes.push(response),
            Err(error) => last_error = Some(error),
        }
    }
    if successes.is_empty() {
        return Err(last_error
            .unwrap_or_else(|| FetchError::unclassified(url.as_str(), "no attempts were issued")));
    }

    let top = successes
        .iter()
        .map(|response| score_status(response.status))
        .max()
        .unwrap_or(0);
    let mut candidates: Vec<AttemptResponse> = successes
        .into_iter()
        .filter(|response| score_status(response.status) == top)
        .collect();
    debug!(score = top, candidates = candidates.len(), %url, "race settled");

    if candidates.len() == 1 {
        // Sole winner keeps its body unread.
        return candidates.pop().map_or_else(
            || Err(FetchError::unclassified(url.as_str(), "empty candidates")),
            Ok,
        );
    }

    // Several equally-scored responses: the one with the most content wins.
    let mut best: Option<(usize, AttemptResponse, bytes::Bytes)> = None;
    for response in candidates {
        let AttemptResponse {
            status,
            reason,
            headers,
            body,
        } = response;
        let drained = match body {
            Some(payload) => match payload.into_bytes().await {
                Ok(bytes) => bytes,
                Err(error) => {
                    warn!(%url, %error, "tie-break drain failed, ranking candidate empty");
                    bytes::Bytes::new()
                }
            },
            None => bytes::Bytes::new(),
        };
        let length = drained.len();
        let keep = best
            .as_ref()
            .is_none_or(|(best_len, _, _)| length > *best_len);
        if keep {
            best = Some((
                length,
                AttemptResponse {
                    status,
                    reason,
                    headers,
                    body: None,
                },
                drained,
            ));
        }
    }

    best.map_or_else(
        || Err(FetchError::unclassified(url.as_str(), "empty candidates")),
        |(_, mut winner, bytes)| {
            winner.body = Some(Payload::buffered(bytes, url.clone()));
            Ok(winner)
        },
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fetch::FetchKind;
    use crate::fetch::attempt::HeaderBlock;

    fn url() -> Url {
        Url::parse("https://example.com/resource").unwrap()
    }

    fn response(status: u16, body: &'static [u8]) -> AttemptResponse {
        AttemptResponse {
            status,
            reason: None,
            headers: vec![HeaderBlock::new(status, None)],
            body: Some(Payload::buffered(bytes::Bytes::from_static(body), url())),
        }
    }

    #[test]
    fn test_score_bands() {
        assert_eq!(score_status(200), 1000);
        assert_eq!(score_status(204), 904);
        assert_eq!(score_status(302), 802);
        assert_eq!(score_status(404), 704);
        assert_eq!(score_status(503), 603);
        assert_eq!(score_status(101), 101);
        assert!(score_status(200) > score_status(204));
        assert!(score_status(204) > score_status(301));
        assert!(score_status(301) > score_status(404));
        assert!(score_status(404) > score_status(500));
    }

    #[tokio::test]
    async fn test_best_status_wins() {
        let outcomes = vec![
            Ok(response(404, b"not found")),
            Ok(response(200, b"content")),
            Ok(response(500, b"oops")),
        ];
        let winner = select_best(outcomes, &url()).await.unwrap();
        assert_eq!(winner.status, 200);
    }

    #[tokio::test]
    async fn test_tie_breaks_toward_longest_body() {
        let long = vec![b'x'; 5000];
        let outcomes = vec![
            Ok(response(200, b"short")),
            Ok(AttemptResponse {
                status: 200,
                reason: None,
                headers: vec![HeaderBlock::new(200, None)],
                body: Some(Payload::buffered(bytes::Bytes::from(long.clone()), url())),
            }),
        ];
        let winner = select_best(outcomes, &url()).await.unwrap();
        assert_eq!(winner.status, 200);
        let body = winner.body.unwrap().into_bytes().await.unwrap();
        assert_eq!(body.len(), 5000);
    }

    #[tokio::test]
    async fn test_all_failures_returns_last_error() {
        let outcomes: Vec<Result<AttemptResponse, FetchError>> = vec![
            Err(FetchError::bad_attempt("https://example.com/", "first")),
            Err(FetchError::bad_approach("https://example.com/", "second")),
        ];
        let error = select_best(outcomes, &url()).await.unwrap_err();
        assert_eq!(error.kind(), FetchKind::BadApproach);
        assert!(error.to_string().contains("second"));
    }

    #[tokio::test]
    async fn test_sole_winner_among_failures() {
        let outcomes = vec![
            Err(FetchError::bad_attempt("https://example.com/", "boom")),
            Ok(response(200, b"payload")),
        ];
        let winner = select_best(outcomes, &url()).await.unwrap();
        assert_eq!(winner.status, 200);
        let body = winner.body.unwrap().into_bytes().await.unwrap();
        assert_eq!(&body[..], b"payload");
    }

    #[test]
    fn test_with_attempts_clamps_to_one() {
        let coordinator = RaceCoordinator::default().with_attempts(0);
        assert_eq!(coordinator.attempts, 1);
    }
}
