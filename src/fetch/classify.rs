//! Transport-error classification.
//!
//! Raw transport failures are first reduced to a [`TransportErrorKind`] and
//! then mapped through a fixed table to a [`FetchKind`] severity. Kinds with
//! no table entry produce no classified error; callers fall back to a generic
//! unclassified failure carrying the raw message.

use tracing::debug;
use url::Url;

use super::error::{FetchError, FetchKind};

/// Raw transport error codes this layer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// DNS resolution of the target host failed.
    HostNotResolved,
    /// The attempt exceeded its time budget or stalled below the throughput
    /// floor.
    Timeout,
    /// The URL scheme is not one this transport speaks.
    UnsupportedScheme,
    /// TLS peer verification failed.
    PeerVerification,
    /// The remote denied access at the transport level.
    AccessDenied,
    /// Sending the request failed mid-flight.
    SendFailed,
    /// Receiving the response failed mid-flight.
    ReceiveFailed,
    /// The server closed the connection without replying.
    EmptyReply,
    /// The TLS handshake could not be completed.
    TlsConnect,
    /// The QUIC handshake could not be completed.
    QuicConnect,
    /// DNS resolution of the configured proxy failed.
    ProxyNotResolved,
    /// The TCP connection could not be established.
    ConnectFailed,
    /// The transfer ended before the advertised length was received.
    PartialTransfer,
    /// Anything the table does not recognize.
    Other,
}

/// Returns the severity for a transport error kind, or `None` when the kind
/// has no entry in the classification table.
#[must_use]
pub fn severity_for(kind: TransportErrorKind) -> Option<FetchKind> {
    use TransportErrorKind as K;
    match kind {
        K::HostNotResolved => Some(FetchKind::Fatal),

        // Maybe retry, but not with this transport again.
        K::Timeout | K::UnsupportedScheme | K::PeerVerification => Some(FetchKind::BadApproach),

        // Transient; safe to retry as-is.
        K::AccessDenied
        | K::SendFailed
        | K::ReceiveFailed
        | K::EmptyReply
        | K::TlsConnect
        | K::QuicConnect
        | K::ProxyNotResolved
        | K::ConnectFailed
        | K::PartialTransfer => Some(FetchKind::BadAttempt),

        K::Other => None,
    }
}

/// Builds a classified [`FetchError`] for a transport failure against `url`.
///
/// Unrecognized kinds fall back to an unclassified error wrapping the raw
/// message.
#[must_use]
pub fn digest_transport_error(url: &Url, kind: TransportErrorKind, message: &str) -> FetchError {
    match severity_for(kind) {
        Some(FetchKind::Fatal) => FetchError::unreachable(url.as_str(), message),
        Some(FetchKind::BadApproach) => FetchError::bad_approach(url.as_str(), message),
        Some(FetchKind::BadAttempt) => FetchError::bad_attempt(url.as_str(), message),
        Some(FetchKind::Unclassified) | None => FetchError::unclassified(url.as_str(), message),
    }
}

/// Classifies a reqwest error against the table, attaching it as the cause.
pub fn classify_reqwest_error(url: &Url, error: reqwest::Error) -> FetchError {
    let kind = probe_reqwest_error(&error);
    debug!(url = %url, ?kind, error = %error, "classifying transport error");
    digest_transport_error(url, kind, &error.to_string()).with_source(error)
}

/// Reduces a reqwest error to a raw transport kind.
///
/// reqwest does not expose transport codes directly, so this probes the
/// structured predicates first and the rendered error chain after.
#[must_use]
pub fn probe_reqwest_error(error: &reqwest::Error) -> TransportErrorKind {
    if error.is_timeout() {
        return TransportErrorKind::Timeout;
    }
    if error.is_builder() {
        return TransportErrorKind::UnsupportedScheme;
    }

    let rendered = render_error_chain(error);
    let kind = kind_from_message(&rendered);
    if kind != TransportErrorKind::Other {
        return kind;
    }

    if error.is_connect() {
        return TransportErrorKind::ConnectFailed;
    }
    if error.is_body() || error.is_decode() {
        return TransportErrorKind::ReceiveFailed;
    }
    if error.is_request() {
        return TransportErrorKind::SendFailed;
    }
    TransportErrorKind::Other
}

/// Maps a rendered error chain to a transport kind by substring probing.
///
/// Ordering matters: proxy resolution is checked before generic DNS failure,
/// and peer verification before generic TLS failure.
#[must_use]
pub fn kind_from_message(message: &str) -> TransportErrorKind {
    let lower = message.to_lowercase();

    if lower.contains("unsupported url scheme") || lower.contains("unsupported protocol") {
        return TransportErrorKind::UnsupportedScheme;
    }
    let dns_failure = lower.contains("dns error")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
        || lower.contains("no such host");
    if dns_failure {
        if lower.contains("proxy") {
            return TransportErrorKind::ProxyNotResolved;
        }
        return TransportErrorKind::HostNotResolved;
    }
    if lower.contains("certificate") || lower.contains("verify failed") {
        return TransportErrorKind::PeerVerification;
    }
    if lower.contains("tls") || lower.contains("ssl") || lower.contains("handshake") {
        return TransportErrorKind::TlsConnect;
    }
    if lower.contains("quic") {
        return TransportErrorKind::QuicConnect;
    }
    if lower.contains("access denied") || lower.contains("remote access") {
        return TransportErrorKind::AccessDenied;
    }
    if lower.contains("connection refused") {
        return TransportErrorKind::ConnectFailed;
    }
    if lower.contains("broken pipe") || lower.contains("error writing") {
        return TransportErrorKind::SendFailed;
    }
    if lower.contains("connection reset") || lower.contains("error reading") {
        return TransportErrorKind::ReceiveFailed;
    }
    if lower.contains("empty reply") || lower.contains("connection closed before") {
        return TransportErrorKind::EmptyReply;
    }
    if lower.contains("incomplete message") || lower.contains("partial") {
        return TransportErrorKind::PartialTransfer;
    }
    TransportErrorKind::Other
}

/// Renders the full cause chain so probes see hyper/io detail that reqwest's
/// top-level message hides.
fn render_error_chain(error: &reqwest::Error) -> String {
    let mut rendered = error.to_string();
    let mut cause: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(error);
    while let Some(current) = cause {
        rendered.push_str(": ");
        rendered.push_str(&current.to_string());
        cause = current.source();
    }
    rendered
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn target() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    #[test]
    fn test_dns_failure_is_fatal() {
        assert_eq!(
            severity_for(TransportErrorKind::HostNotResolved),
            Some(FetchKind::Fatal)
        );
        let error = digest_transport_error(
            &target(),
            TransportErrorKind::HostNotResolved,
            "dns error: failed to lookup address",
        );
        assert_eq!(error.kind(), FetchKind::Fatal);
    }

    #[test]
    fn test_bad_approach_kinds() {
        for kind in [
            TransportErrorKind::Timeout,
            TransportErrorKind::UnsupportedScheme,
            TransportErrorKind::PeerVerification,
        ] {
            assert_eq!(severity_for(kind), Some(FetchKind::BadApproach), "{kind:?}");
        }
    }

    #[test]
    fn test_bad_attempt_kinds() {
        for kind in [
            TransportErrorKind::AccessDenied,
            TransportErrorKind::SendFailed,
            TransportErrorKind::ReceiveFailed,
            TransportErrorKind::EmptyReply,
            TransportErrorKind::TlsConnect,
            TransportErrorKind::QuicConnect,
            TransportErrorKind::ProxyNotResolved,
            TransportErrorKind::ConnectFailed,
            TransportErrorKind::PartialTransfer,
        ] {
            assert_eq!(severity_for(kind), Some(FetchKind::BadAttempt), "{kind:?}");
        }
    }

    #[test]
    fn test_unrecognized_kind_has_no_entry() {
        assert_eq!(severity_for(TransportErrorKind::Other), None);
        let error = digest_transport_error(&target(), TransportErrorKind::Other, "weird failure");
        assert_eq!(error.kind(), FetchKind::Unclassified);
        assert!(error.to_string().contains("weird failure"));
    }

    #[test]
    fn test_kind_from_message_dns() {
        assert_eq!(
            kind_from_message("dns error: failed to lookup address information"),
            TransportErrorKind::HostNotResolved
        );
    }

    #[test]
    fn test_kind_from_message_proxy_dns() {
        assert_eq!(
            kind_from_message("proxy error: dns error: no such host"),
            TransportErrorKind::ProxyNotResolved
        );
    }

    #[test]
    fn test_kind_from_message_reset() {
        assert_eq!(
            kind_from_message("error sending request: Connection reset by peer"),
            TransportErrorKind::ReceiveFailed
        );
    }

    #[test]
    fn test_kind_from_message_certificate() {
        assert_eq!(
            kind_from_message("invalid peer certificate contents"),
            TransportErrorKind::PeerVerification
        );
    }

    #[test]
    fn test_kind_from_message_tls_handshake() {
        assert_eq!(
            kind_from_message("tls handshake eof"),
            TransportErrorKind::TlsConnect
        );
    }

    #[test]
    fn test_kind_from_message_refused() {
        assert_eq!(
            kind_from_message("tcp connect error: Connection refused"),
            TransportErrorKind::ConnectFailed
        );
    }

    #[test]
    fn test_kind_from_message_unknown() {
        assert_eq!(
            kind_from_message("some entirely novel failure"),
            TransportErrorKind::Other
        );
    }
}
