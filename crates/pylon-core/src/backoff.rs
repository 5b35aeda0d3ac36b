//! Backoff constants and `Retry-After` parsing.
//!
//! The reconnect schedule for the persistent connection and the
//! transient-failure schedule for individual REST calls are both
//! deterministic; rate-limit waits come from the server and are parsed,
//! not computed.

use std::time::Duration;

/// Base reconnect delay.
pub const RECONNECT_BASE_MS: u64 = 1000;
/// Reconnect delay ceiling.
pub const RECONNECT_CAP_MS: u64 = 30_000;
/// Abnormal-disconnect attempts before giving up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
/// Total execution attempts for one REST call (initial + retries).
pub const MAX_REQUEST_ATTEMPTS: u32 = 3;
/// Fixed courtesy delay between consecutive queued requests.
pub const COURTESY_DELAY_MS: u64 = 100;

/// Base delay for transient-failure retries.
pub const TRANSIENT_RETRY_BASE: Duration = Duration::from_secs(1);

/// Delay before retrying a transient REST failure.
///
/// `base * 2^attempt_index`: with the default base, 1s after the first
/// failure and 2s after the second.
#[must_use]
pub fn transient_retry_delay(base: Duration, attempt_index: u32) -> Duration {
    base.saturating_mul(1u32 << attempt_index.min(31))
}

/// Parse a `Retry-After` value: integer seconds or an RFC 2822 HTTP-date.
///
/// Returns `None` when the value is neither. Past dates clamp to zero.
#[must_use]
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value) {
        let delay_ms = date
            .signed_duration_since(chrono::Utc::now())
            .num_milliseconds();
        #[allow(clippy::cast_sign_loss)]
        return Some(Duration::from_millis(delay_ms.max(0) as u64));
    }

    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
