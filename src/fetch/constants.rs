//! Constants for the fetch module (timeouts, limits, race configuration).

use std::time::Duration;

/// Connect timeout applied to every attempt (fixed, short).
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(3_000);

/// Default total timeout per attempt when the caller does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Minimum bytes that must arrive within one throughput window.
pub const THROUGHPUT_FLOOR_BYTES: u64 = 32_768;

/// Sliding window over which the throughput floor is evaluated.
pub const THROUGHPUT_WINDOW: Duration = Duration::from_millis(5_000);

/// Maximum raw response size (4 GiB); larger transfers are aborted.
pub const MAX_RESPONSE_BYTES: u64 = 4 * 1024 * 1024 * 1024;

/// Maximum redirect hops per logical fetch.
pub const HOP_BUDGET: u32 = 6;

/// Default number of concurrent attempts per hop.
pub const DEFAULT_RACE_ATTEMPTS: usize = 3;

/// Environment variable overriding the concurrent attempt count.
pub const RACE_ATTEMPTS_ENV: &str = "SIDEFETCH_RACE_ATTEMPTS";

/// Reads the configured concurrent attempt count from the environment.
///
/// Non-numeric or zero values fall back to [`DEFAULT_RACE_ATTEMPTS`].
#[must_use]
pub fn race_attempts() -> usize {
    attempts_from(std::env::var(RACE_ATTEMPTS_ENV).ok().as_deref())
}

pub(crate) fn attempts_from(raw: Option<&str>) -> usize {
    raw.and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|&count| count >= 1)
        .unwrap_or(DEFAULT_RACE_ATTEMPTS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempts_default_when_unset() {
        assert_eq!(attempts_from(None), DEFAULT_RACE_ATTEMPTS);
    }

    #[test]
    fn test_attempts_parses_valid_value() {
        assert_eq!(attempts_from(Some("5")), 5);
        assert_eq!(attempts_from(Some(" 1 ")), 1);
    }

    #[test]
    fn test_attempts_rejects_zero_and_garbage() {
        assert_eq!(attempts_from(Some("0")), DEFAULT_RACE_ATTEMPTS);
        assert_eq!(attempts_from(Some("-2")), DEFAULT_RACE_ATTEMPTS);
        assert_eq!(attempts_from(Some("many")), DEFAULT_RACE_ATTEMPTS);
        assert_eq!(attempts_from(Some("")), DEFAULT_RACE_ATTEMPTS);
    }
}
