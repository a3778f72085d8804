//! Result packaging.
//!
//! Turns a walked chain into the outward-facing result: the resolved final
//! URL, per-hop header records keyed by the URL that produced them, a
//! best-effort content type, a suggested file name, and the retained payload.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument, warn};
use url::Url;

use super::attempt::HeaderBlock;
use super::error::FetchError;
use super::options::FetchRequest;
use super::walker::{FetchedBody, WalkedResult};
use crate::support::liveness::LivenessSignal;
use crate::support::scope::{PayloadArena, ScopeId};

/// Statuses the packager re-resolves the final URL through. 303 is not in
/// this set: a see-other answer is reported under the URL that produced it.
const RESOLVING_STATUSES: [u16; 4] = [301, 302, 307, 308];

/// Snapshot of a single hop as seen by the outside world.
#[derive(Debug, Clone, Serialize)]
pub struct HopRecord {
    /// Status code of the hop.
    pub status: u16,
    /// Header fields in wire order, names lower-cased.
    pub headers: Vec<(String, String)>,
    /// Declared content type on this hop, if any.
    pub content_type: Option<String>,
}

/// The packaged outcome handed to callers.
#[derive(Debug)]
pub struct PackagedResult {
    /// URL the chain resolved to.
    pub final_url: Url,
    /// Terminal status code.
    pub status: u16,
    /// Canonical reason phrase for the terminal status, when one exists.
    pub reason: Option<String>,
    /// Terminal hop's header block.
    pub headers: HeaderBlock,
    /// Every hop's header block in walk order.
    pub chain: Vec<HeaderBlock>,
    /// Resolved content type, never empty.
    pub content_type: String,
    /// Raw `Content-Disposition` value from the terminal hop.
    pub content_disposition: Option<String>,
    /// Suggested file name from disposition or the final URL path.
    pub file_name: Option<String>,
    /// Per-hop records keyed by the URL that produced each hop.
    pub impersonate: HashMap<String, HopRecord>,
    /// Hop origin mapped to the proxy URL it was fetched through; empty when
    /// no proxy was configured.
    pub proxy_origin: HashMap<String, String>,
    /// Materialized body, retained in the arena under the caller's scope.
    pub payload: Option<Arc<FetchedBody>>,
}

/// Packages walked results and anchors payload lifetimes to scopes.
pub struct ResultPackager {
    arena: Arc<PayloadArena>,
    liveness: Arc<dyn LivenessSignal>,
}

impl ResultPackager {
    /// Creates a packager retaining payloads in `arena` and pulsing
    /// `liveness` on every packaged result.
    #[must_use]
    pub fn new(arena: Arc<PayloadArena>, liveness: Arc<dyn LivenessSignal>) -> Self {
        Self { arena, liveness }
    }

    /// Packages `walked` for the caller's `scope`.
    ///
    /// Any settled chain counts as liveness, including error statuses; only
    /// transport failures upstream of packaging do not reach here.
    ///
    /// # Errors
    ///
    /// Fails when the walked chain carries no header block at all.
    #[instrument(level = "debug", skip(self, request, walked), fields(url = %request.url, status = walked.status))]
    pub fn package(
        &self,
        scope: ScopeId,
        request: &FetchRequest,
        walked: WalkedResult,
    ) -> Result<PackagedResult, FetchError> {
        let WalkedResult {
            status,
            reason,
            chain,
            body,
        } = walked;
        let Some(terminal) = chain.last().cloned() else {
            return Err(FetchError::unclassified(
                request.url.as_str(),
                "walked chain carried no header block",
            ));
        };

        let mut final_url = request.url.clone();
        let mut impersonate = HashMap::new();
        let mut proxy_origin = HashMap::new();
        for hop in &chain {
            let href = final_url.as_str().to_string();
            impersonate.insert(
                href,
                HopRecord {
                    status: hop.status,
                    headers: hop.fields().to_vec(),
                    content_type: hop.get("content-type").map(str::to_string),
                },
            );
            if let Some(proxy) = &request.proxy_url {
                proxy_origin.insert(final_url.origin().ascii_serialization(), proxy.to_string());
            }
            if RESOLVING_STATUSES.contains(&hop.status) {
                if let Some(location) = hop.get("location") {
                    match final_url.join(location) {
                        Ok(next) => final_url = next,
                        Err(error) => {
                            warn!(%final_url, location, %error, "unresolvable hop location");
                        }
                    }
                }
            }
        }

        let content_disposition = terminal.get("content-disposition").map(str::to_string);
        let file_name = content_disposition
            .as_deref()
            .and_then(parse_content_disposition)
            .or_else(|| file_name_from_url(&final_url));
        let content_type = resolve_content_type(&terminal, body.as_ref());

        let payload = body.map(Arc::new);
        if let Some(payload) = &payload {
            self.arena.retain(scope, Arc::clone(payload));
        }
        self.liveness.it_worked();
        debug!(%final_url, status, content_type, "packaged result");

        Ok(PackagedResult {
            final_url,
            status,
            reason,
            headers: terminal,
            chain,
            content_type,
            content_disposition,
            file_name,
            impersonate,
            proxy_origin,
            payload,
        })
    }
}

/// Content type precedence: declared header, then magic-byte sniffing, then
/// the generic binary type.
fn resolve_content_type(terminal: &HeaderBlock, body: Option<&FetchedBody>) -> String {
    if let Some(declared) = terminal.get("content-type") {
        let declared = declared.trim();
        if !declared.is_empty() {
            return declared.to_lowercase();
        }
    }
    let sniffed = match body {
        Some(FetchedBody::Blob(bytes)) => infer::get(bytes).map(|kind| kind.mime_type()),
        Some(FetchedBody::File { path, .. }) => infer::get_from_path(path)
            .ok()
            .flatten()
            .map(|kind| kind.mime_type()),
        None => None,
    };
    sniffed.unwrap_or("application/octet-stream").to_string()
}

/// Extracts a file name from a `Content-Disposition` value, preferring the
/// RFC 5987 `filename*` form over plain `filename`.
fn parse_content_disposition(value: &str) -> Option<String> {
    for part in value.split(';') {
        let part = part.trim();
        if let Some(encoded) = part.strip_prefix("filename*=") {
            let encoded = encoded
                .trim_matches('"')
                .rsplit_once("''")
                .map_or(encoded.trim_matches('"'), |(_, tail)| tail);
            if let Ok(decoded) = urlencoding::decode(encoded) {
                let decoded = decoded.trim();
                if !decoded.is_empty() {
                    return Some(decoded.to_string());
                }
            }
        }
    }
    for part in value.split(';') {
        let part = part.trim();
        if let Some(name) = part.strip_prefix("filename=") {
            let name = name.trim_matches('"').trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }
    None
}

fn file_name_from_url(url: &Url) -> Option<String> {
    let tail = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())?;
    if tail.is_empty() {
        return None;
    }
    urlencoding::decode(tail)
        .map(|decoded| decoded.to_string())
        .ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::support::liveness::CountingLiveness;

    fn block(status: u16, fields: &[(&str, &str)]) -> HeaderBlock {
        let mut block = HeaderBlock::new(status, None);
        for (name, value) in fields {
            block.push(name, (*value).to_string());
        }
        block
    }

    fn packager() -> (ResultPackager, Arc<PayloadArena>, Arc<CountingLiveness>) {
        let arena = Arc::new(PayloadArena::new());
        let liveness = Arc::new(CountingLiveness::new());
        let packager = ResultPackager::new(Arc::clone(&arena), liveness.clone());
        (packager, arena, liveness)
    }

    fn request(url: &str) -> FetchRequest {
        FetchRequest::new(Url::parse(url).unwrap())
    }

    #[test]
    fn test_final_url_resolves_through_redirects() {
        let (packager, arena, _) = packager();
        let scope = arena.open_scope();
        let walked = WalkedResult {
            status: 200,
            reason: Some("OK".to_string()),
            chain: vec![
                block(301, &[("location", "/moved")]),
                block(302, &[("location", "https://cdn.example.net/asset.bin")]),
                block(200, &[("content-type", "Application/Octet-Stream")]),
            ],
            body: None,
        };
        let result = packager
            .package(scope, &request("https://example.com/start"), walked)
            .unwrap();
        assert_eq!(result.final_url.as_str(), "https://cdn.example.net/asset.bin");
        assert_eq!(result.content_type, "application/octet-stream");
        assert_eq!(result.impersonate.len(), 3);
        assert!(result.impersonate.contains_key("https://example.com/start"));
        assert!(result.impersonate.contains_key("https://example.com/moved"));
        assert!(result.proxy_origin.is_empty());
    }

    #[test]
    fn test_proxy_origin_maps_hop_origins_to_the_configured_proxy() {
        let (packager, arena, _) = packager();
        let scope = arena.open_scope();
        let walked = WalkedResult {
            status: 200,
            reason: None,
            chain: vec![
                block(301, &[("location", "https://cdn.example.net/asset.bin")]),
                block(200, &[]),
            ],
            body: None,
        };
        let request = request("https://example.com/start")
            .with_proxy(Url::parse("http://proxy.internal:3128").unwrap());
        let result = packager.package(scope, &request, walked).unwrap();

        assert_eq!(
            result.proxy_origin.get("https://example.com"),
            Some(&"http://proxy.internal:3128/".to_string())
        );
        assert_eq!(
            result.proxy_origin.get("https://cdn.example.net"),
            Some(&"http://proxy.internal:3128/".to_string())
        );
        assert_eq!(result.proxy_origin.len(), 2);
    }

    #[test]
    fn test_see_other_does_not_advance_final_url() {
        let (packager, arena, _) = packager();
        let scope = arena.open_scope();
        let walked = WalkedResult {
            status: 200,
            reason: None,
            chain: vec![
                block(303, &[("location", "https://elsewhere.example/")]),
                block(200, &[]),
            ],
            body: None,
        };
        let result = packager
            .package(scope, &request("https://example.com/form"), walked)
            .unwrap();
        assert_eq!(result.final_url.as_str(), "https://example.com/form");
    }

    #[test]
    fn test_file_name_precedence() {
        assert_eq!(
            parse_content_disposition("attachment; filename=\"report.pdf\""),
            Some("report.pdf".to_string())
        );
        assert_eq!(
            parse_content_disposition(
                "attachment; filename=\"fallback.bin\"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"
            ),
            Some("résumé.pdf".to_string())
        );
        assert_eq!(parse_content_disposition("inline"), None);
    }

    #[test]
    fn test_file_name_falls_back_to_url_tail() {
        let url = Url::parse("https://example.com/files/archive%20one.zip").unwrap();
        assert_eq!(file_name_from_url(&url), Some("archive one.zip".to_string()));
        let bare = Url::parse("https://example.com/").unwrap();
        assert_eq!(file_name_from_url(&bare), None);
    }

    #[test]
    fn test_sniffs_content_type_from_blob() {
        let terminal = block(200, &[]);
        let png = FetchedBody::Blob(bytes::Bytes::from_static(&[
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0,
        ]));
        assert_eq!(resolve_content_type(&terminal, Some(&png)), "image/png");
        assert_eq!(
            resolve_content_type(&terminal, None),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_retains_payload_and_pulses_liveness() {
        let (packager, arena, liveness) = packager();
        let scope = arena.open_scope();
        let walked = WalkedResult {
            status: 404,
            reason: Some("Not Found".to_string()),
            chain: vec![block(404, &[("content-type", "text/html")])],
            body: Some(FetchedBody::Blob(bytes::Bytes::from_static(b"gone"))),
        };
        let result = packager
            .package(scope, &request("https://example.com/missing"), walked)
            .unwrap();
        assert_eq!(result.status, 404);
        assert!(result.payload.is_some());
        assert_eq!(arena.retained_count(scope), 1);
        assert_eq!(liveness.count(), 1);

        arena.release(scope);
        assert_eq!(arena.retained_count(scope), 0);
    }
}
