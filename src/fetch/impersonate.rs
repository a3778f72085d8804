//! Browser impersonation profile.
//!
//! Derives a consistent Chrome identity (UA string, platform, version tokens,
//! client-hint headers) and merges it with caller-supplied headers. The TLS
//! fingerprint itself is the transport's problem; this module only makes the
//! header set tell the same story.

use thiserror::Error;

/// Chrome major version advertised by the default profile.
const DEFAULT_CHROME_VERSION: &str = "132";

/// WebKit-family token advertised by the default profile.
const DEFAULT_WEBKIT_VERSION: &str = "537.36";

/// Error raised when an impersonation profile is reconfigured with a UA
/// string the parser cannot derive version tokens from.
///
/// This is a configuration error, not a per-request error: requests never
/// re-validate the profile.
#[derive(Debug, Error)]
#[error("malformed user agent (missing {missing} token): {user_agent}")]
pub struct ImpersonationError {
    /// Which token could not be parsed (`Chrome/…` or `AppleWebKit/…`).
    pub missing: &'static str,
    /// The offending UA string.
    pub user_agent: String,
}

/// A consistent browser identity used to dress every outgoing attempt.
#[derive(Debug, Clone)]
pub struct ImpersonationProfile {
    user_agent: String,
    chrome_version: String,
    webkit_version: String,
    platform: String,
}

impl Default for ImpersonationProfile {
    fn default() -> Self {
        let user_agent = format!(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/{DEFAULT_WEBKIT_VERSION} \
             (KHTML, like Gecko) Chrome/{DEFAULT_CHROME_VERSION}.0.0.0 Safari/{DEFAULT_WEBKIT_VERSION}"
        );
        Self {
            user_agent,
            chrome_version: DEFAULT_CHROME_VERSION.to_string(),
            webkit_version: DEFAULT_WEBKIT_VERSION.to_string(),
            platform: default_platform().to_string(),
        }
    }
}

impl ImpersonationProfile {
    /// Reconfigures the profile from a full Chrome UA string, re-deriving the
    /// browser major version and WebKit token from it.
    ///
    /// # Errors
    ///
    /// Returns [`ImpersonationError`] when the UA lacks a `Chrome/<major>` or
    /// `AppleWebKit/<version>` token.
    pub fn with_user_agent(user_agent: &str) -> Result<Self, ImpersonationError> {
        let chrome_version =
            token_after(user_agent, "Chrome/", |c| c.is_ascii_digit()).ok_or_else(|| {
                ImpersonationError {
                    missing: "Chrome/<major>",
                    user_agent: user_agent.to_string(),
                }
            })?;
        let webkit_version = token_after(user_agent, "AppleWebKit/", |c| {
            c.is_ascii_digit() || c == '.'
        })
        .ok_or_else(|| ImpersonationError {
            missing: "AppleWebKit/<version>",
            user_agent: user_agent.to_string(),
        })?;
        Ok(Self {
            user_agent: user_agent.to_string(),
            chrome_version,
            webkit_version,
            platform: default_platform().to_string(),
        })
    }

    /// Overrides the default platform used for the `Sec-Ch-Ua-Platform` hint
    /// when the UA string does not pin one.
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Returns the full UA string.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Returns the Chrome major version token.
    #[must_use]
    pub fn chrome_version(&self) -> &str {
        &self.chrome_version
    }

    /// Returns the WebKit-family version token.
    #[must_use]
    pub fn webkit_version(&self) -> &str {
        &self.webkit_version
    }

    /// Platform reported in the `Sec-Ch-Ua-Platform` hint.
    ///
    /// Sniffed from UA substrings; the configured default applies only when
    /// the UA names no platform.
    #[must_use]
    pub fn platform_hint(&self) -> &str {
        if self.user_agent.contains("Windows") {
            "Windows"
        } else if self.user_agent.contains("Android") {
            "Android"
        } else if self.user_agent.contains("iPhone")
            || self.user_agent.contains("iPad")
            || self.user_agent.contains("iPod")
        {
            "iOS"
        } else if self.user_agent.contains("CrOS") {
            "Chrome OS"
        } else if self.user_agent.contains("Macintosh") {
            "macOS"
        } else {
            &self.platform
        }
    }

    /// The fixed mixin header set for a top-level navigation.
    #[must_use]
    pub fn mixin_headers(&self) -> Vec<(String, String)> {
        let chrome = &self.chrome_version;
        vec![
            (
                "Sec-Ch-Ua".to_string(),
                format!(
                    "\"Google Chrome\";v=\"{chrome}\", \"Not-A.Brand\";v=\"8\", \"Chromium\";v=\"{chrome}\""
                ),
            ),
            ("Sec-Ch-Ua-Mobile".to_string(), "?0".to_string()),
            (
                "Sec-Ch-Ua-Platform".to_string(),
                format!("\"{}\"", self.platform_hint()),
            ),
            ("Upgrade-Insecure-Requests".to_string(), "1".to_string()),
            ("User-Agent".to_string(), self.user_agent.clone()),
            (
                "Accept".to_string(),
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,\
                 image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7"
                    .to_string(),
            ),
            ("Sec-Fetch-Site".to_string(), "none".to_string()),
            ("Sec-Fetch-Mode".to_string(), "navigate".to_string()),
            ("Sec-Fetch-User".to_string(), "?1".to_string()),
            ("Sec-Fetch-Dest".to_string(), "document".to_string()),
            (
                "Accept-Encoding".to_string(),
                "gzip, deflate, br, zstd".to_string(),
            ),
            ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
        ]
    }

    /// Merges caller headers into the mixin set.
    ///
    /// A caller header whose lower-cased name matches a mixin header replaces
    /// the mixin value in place; remaining caller headers are appended after
    /// the mixin set in their original order.
    #[must_use]
    pub fn merge_headers(&self, extra: &[(String, String)]) -> Vec<(String, String)> {
        let mut merged = self.mixin_headers();
        let mut consumed = vec![false; extra.len()];

        for (name, value) in &mut merged {
            let lower = name.to_lowercase();
            for (index, (extra_name, extra_value)) in extra.iter().enumerate() {
                if !consumed[index] && *extra_name == lower {
                    *value = extra_value.clone();
                    consumed[index] = true;
                }
            }
        }
        for (index, (extra_name, extra_value)) in extra.iter().enumerate() {
            if !consumed[index] {
                merged.push((extra_name.clone(), extra_value.clone()));
            }
        }
        merged
    }
}

fn default_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "macOS"
    } else if cfg!(target_os = "windows") {
        "Windows"
    } else {
        "Linux"
    }
}

fn token_after(haystack: &str, marker: &str, accept: impl Fn(char) -> bool) -> Option<String> {
    let start = haystack.find(marker)? + marker.len();
    let token: String = haystack[start..].chars().take_while(|&c| accept(c)).collect();
    if token.is_empty() { None } else { Some(token) }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MAC_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
        AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

    #[test]
    fn test_default_profile_versions() {
        let profile = ImpersonationProfile::default();
        assert_eq!(profile.chrome_version(), "132");
        assert_eq!(profile.webkit_version(), "537.36");
        assert!(profile.user_agent().contains("Chrome/132.0.0.0"));
    }

    #[test]
    fn test_with_user_agent_parses_tokens() {
        let profile = ImpersonationProfile::with_user_agent(MAC_UA).unwrap();
        assert_eq!(profile.chrome_version(), "131");
        assert_eq!(profile.webkit_version(), "537.36");
    }

    #[test]
    fn test_malformed_ua_is_configuration_error() {
        let error = ImpersonationProfile::with_user_agent("Mozilla/5.0 hand-rolled").unwrap_err();
        assert!(error.to_string().contains("Chrome/<major>"));

        let error =
            ImpersonationProfile::with_user_agent("Chrome/120.0 no webkit token").unwrap_err();
        assert!(error.to_string().contains("AppleWebKit/<version>"));
    }

    #[test]
    fn test_platform_sniffing_overrides_default() {
        let profile = ImpersonationProfile::with_user_agent(MAC_UA)
            .unwrap()
            .with_platform("Linux");
        assert_eq!(profile.platform_hint(), "macOS");

        let android = ImpersonationProfile::with_user_agent(
            "Mozilla/5.0 (Linux; Android 14) AppleWebKit/537.36 Chrome/131.0.0.0",
        )
        .unwrap();
        assert_eq!(android.platform_hint(), "Android");
    }

    #[test]
    fn test_configured_platform_used_without_ua_hint() {
        let profile = ImpersonationProfile::with_user_agent(
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 Chrome/131.0.0.0",
        )
        .unwrap()
        .with_platform("Chrome OS");
        assert_eq!(profile.platform_hint(), "Chrome OS");
    }

    #[test]
    fn test_mixin_advertises_all_encodings() {
        let profile = ImpersonationProfile::default();
        let headers = profile.mixin_headers();
        let encoding = headers
            .iter()
            .find(|(name, _)| name == "Accept-Encoding")
            .map(|(_, value)| value.as_str())
            .unwrap();
        for algo in ["gzip", "deflate", "br", "zstd"] {
            assert!(encoding.contains(algo), "{algo} missing from {encoding}");
        }
    }

    #[test]
    fn test_merge_overrides_in_place_case_insensitive() {
        let profile = ImpersonationProfile::default();
        let extra = vec![("accept-language".to_string(), "fr-FR".to_string())];
        let merged = profile.merge_headers(&extra);

        let position = merged
            .iter()
            .position(|(name, _)| name == "Accept-Language")
            .unwrap();
        assert_eq!(merged[position].1, "fr-FR");
        // Overridden in place, not appended.
        assert_eq!(merged.len(), profile.mixin_headers().len());
    }

    #[test]
    fn test_merge_appends_unknown_headers() {
        let profile = ImpersonationProfile::default();
        let extra = vec![("x-request-id".to_string(), "abc".to_string())];
        let merged = profile.merge_headers(&extra);
        let last = merged.last().unwrap();
        assert_eq!(last.0, "x-request-id");
        assert_eq!(last.1, "abc");
    }

    #[test]
    fn test_sec_ch_ua_brand_list() {
        let profile = ImpersonationProfile::default();
        let headers = profile.mixin_headers();
        let brands = headers
            .iter()
            .find(|(name, _)| name == "Sec-Ch-Ua")
            .map(|(_, value)| value.as_str())
            .unwrap();
        assert!(brands.contains("\"Google Chrome\";v=\"132\""));
        assert!(brands.contains("\"Not-A.Brand\";v=\"8\""));
        assert!(brands.contains("\"Chromium\";v=\"132\""));
    }
}
