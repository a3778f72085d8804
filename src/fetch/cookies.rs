//! Cookie records and outgoing `Cookie:` header assembly.
//!
//! This is deliberately not a full cookie store: it carries exactly the
//! subset needed to walk a redirect chain — parse `Set-Cookie` values into
//! records, filter stale or mismatched entries against the next hop's URL,
//! and serialize the survivors into a single request header.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use cookie::Expiration;
use tracing::debug;
use url::Url;

/// A single cookie carried across redirect hops.
///
/// The value is redacted in Debug output to keep session tokens out of logs.
#[derive(Clone)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value (sensitive — never log).
    value: String,
    /// Optional domain scope, as sent by the server (may carry a leading dot).
    pub domain: Option<String>,
    /// Optional path scope.
    pub path: Option<String>,
    /// Optional absolute expiry.
    pub expires: Option<SystemTime>,
    /// Optional Max-Age in seconds; negative values expire the cookie.
    pub max_age: Option<i64>,
    /// Whether the cookie may only travel over an encrypted scheme.
    pub secure: bool,
}

impl Cookie {
    /// Creates a plain name/value cookie with no scoping attributes.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            expires: None,
            max_age: None,
            secure: false,
        }
    }

    /// Returns the cookie value.
    ///
    /// Cookie values are sensitive — avoid logging the return value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Parses one `Set-Cookie` header value into a cookie record.
    ///
    /// Values are percent-decoded on the way in; [`cookie_header`] re-encodes
    /// them on the way out. Malformed headers yield `None`.
    #[must_use]
    pub fn parse_set_cookie(raw: &str) -> Option<Self> {
        let parsed = cookie::Cookie::parse(raw.trim().to_owned()).ok()?;
        let value = urlencoding::decode(parsed.value())
            .map(std::borrow::Cow::into_owned)
            .unwrap_or_else(|_| parsed.value().to_string());
        Some(Self {
            name: parsed.name().to_string(),
            value,
            domain: parsed.domain().map(str::to_string),
            path: parsed.path().map(str::to_string),
            expires: parsed.expires().and_then(expiration_to_system_time),
            max_age: raw_max_age(raw)
                .or_else(|| parsed.max_age().map(|age| age.whole_seconds())),
            secure: parsed.secure().unwrap_or(false),
        })
    }

    /// Returns true if this cookie may be sent to `target` right now.
    fn applies_to(&self, target: &Url, now: SystemTime) -> bool {
        if self.max_age.is_some_and(|age| age < 0) {
            return false;
        }
        if self.expires.is_some_and(|expiry| expiry < now) {
            return false;
        }
        if self.secure && target.scheme() != "https" {
            return false;
        }
        if let Some(domain) = &self.domain {
            let host = target.host_str().unwrap_or("");
            if !host.ends_with(domain.trim_start_matches('.')) {
                return false;
            }
        }
        if let Some(path) = &self.path {
            if !target.path().starts_with(path.as_str()) {
                return false;
            }
        }
        true
    }
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("expires", &self.expires)
            .field("max_age", &self.max_age)
            .field("secure", &self.secure)
            .finish()
    }
}

/// Serializes a cookie set into a single `Cookie:` header value for `target`.
///
/// Last write wins per name, stale or mismatched cookies are dropped, and
/// values are percent-encoded. Returns `None` when nothing survives.
#[must_use]
pub fn cookie_header(cookies: &[Cookie], target: &Url) -> Option<String> {
    let now = SystemTime::now();

    // First pass: name -> value in insertion order, last write wins.
    let mut jar: Vec<(&str, &str)> = Vec::new();
    for cookie in cookies {
        if let Some(slot) = jar.iter_mut().find(|(name, _)| *name == cookie.name) {
            slot.1 = cookie.value();
        } else {
            jar.push((&cookie.name, cookie.value()));
        }
    }

    // Second pass: any record invalid for this target evicts the name.
    for cookie in cookies {
        if !cookie.applies_to(target, now) {
            debug!(name = %cookie.name, url = %target, "dropping cookie for next hop");
            jar.retain(|(name, _)| *name != cookie.name);
        }
    }

    if jar.is_empty() {
        return None;
    }
    let chunks: Vec<String> = jar
        .iter()
        .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
        .collect();
    Some(chunks.join("; "))
}

/// Reads the `Max-Age` attribute straight from the raw header.
///
/// The parsing crate clamps negative values to a zero duration, which erases
/// the delete-this-cookie signal a server sends as `Max-Age=-1`; the sign has
/// to come from the wire text.
fn raw_max_age(raw: &str) -> Option<i64> {
    raw.split(';').skip(1).find_map(|attribute| {
        let (name, value) = attribute.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("max-age") {
            value.trim().parse::<i64>().ok()
        } else {
            None
        }
    })
}

fn expiration_to_system_time(expiration: Expiration) -> Option<SystemTime> {
    let datetime = expiration.datetime()?;
    let timestamp = datetime.unix_timestamp();
    if timestamp >= 0 {
        UNIX_EPOCH.checked_add(Duration::from_secs(timestamp.unsigned_abs()))
    } else {
        UNIX_EPOCH.checked_sub(Duration::from_secs(timestamp.unsigned_abs()))
    }
}
