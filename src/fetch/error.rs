//! Error types for the fetch module.
//!
//! Every failure surfaced by this crate carries one of four kinds that tell
//! the caller what to do next: give up ([`FetchKind::Fatal`]), switch to a
//! different fetch strategy ([`FetchKind::BadApproach`]), retry as-is
//! ([`FetchKind::BadAttempt`]), or inspect the raw message
//! ([`FetchKind::Unclassified`]).

use thiserror::Error;

/// Severity kind of a [`FetchError`], driving the caller's retry-or-escalate
/// decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// The target is unreachable as addressed; retrying without changing the
    /// target is pointless.
    Fatal,

    /// The transport itself is mismatched to the target (timeout, unsupported
    /// scheme, verification failure, cookie preconditions); retry with a
    /// different strategy such as full browser rendering.
    BadApproach,

    /// Transient transport failure; safe to retry the same way.
    BadAttempt,

    /// No taxonomy rule matched; the raw message is all there is.
    Unclassified,
}

/// Errors produced while fetching a URL.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Name resolution failed; the target cannot be reached as addressed.
    #[error("unreachable host for {url}: {message}")]
    Unreachable {
        /// The URL that could not be resolved.
        url: String,
        /// Human-readable failure detail.
        message: String,
        /// The underlying transport error, when one exists.
        #[source]
        source: Option<reqwest::Error>,
    },

    /// The transport strategy is wrong for this target; escalate instead of
    /// retrying the same way.
    #[error("bad approach for {url}: {message}")]
    BadApproach {
        /// The URL being fetched.
        url: String,
        /// Human-readable failure detail.
        message: String,
        /// The underlying transport error, when one exists.
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Transient transport failure; the same request may succeed on retry.
    #[error("bad attempt for {url}: {message}")]
    BadAttempt {
        /// The URL being fetched.
        url: String,
        /// Human-readable failure detail.
        message: String,
        /// The underlying transport error, when one exists.
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Generic wrapped failure carrying the original message.
    #[error("failed to access {url}: {message}")]
    Unclassified {
        /// The URL being fetched.
        url: String,
        /// Human-readable failure detail.
        message: String,
        /// The underlying transport error, when one exists.
        #[source]
        source: Option<reqwest::Error>,
    },
}

impl FetchError {
    /// Creates a fatal name-resolution error.
    pub fn unreachable(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unreachable {
            url: url.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a bad-approach error.
    pub fn bad_approach(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadApproach {
            url: url.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a transient bad-attempt error.
    pub fn bad_attempt(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadAttempt {
            url: url.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates an unclassified error carrying the raw message.
    pub fn unclassified(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unclassified {
            url: url.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the originating transport error as the cause chain.
    #[must_use]
    pub fn with_source(mut self, cause: reqwest::Error) -> Self {
        match &mut self {
            Self::Unreachable { source, .. }
            | Self::BadApproach { source, .. }
            | Self::BadAttempt { source, .. }
            | Self::Unclassified { source, .. } => *source = Some(cause),
        }
        self
    }

    /// Returns the severity kind of this error.
    #[must_use]
    pub fn kind(&self) -> FetchKind {
        match self {
            Self::Unreachable { .. } => FetchKind::Fatal,
            Self::BadApproach { .. } => FetchKind::BadApproach,
            Self::BadAttempt { .. } => FetchKind::BadAttempt,
            Self::Unclassified { .. } => FetchKind::Unclassified,
        }
    }
}

// Note on From trait implementations:
// There is deliberately no `From<reqwest::Error>` here. A raw transport error
// has no severity until the classifier (fetch::classify) digests it, and the
// variants need the target URL which the source error does not carry.
