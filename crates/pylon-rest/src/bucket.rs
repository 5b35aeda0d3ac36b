//! Per-route rate-limit accounting.
//!
//! Buckets are created lazily on the first response for a route and
//! overwritten unconditionally on every subsequent response — the quota
//! headers are the sole source of truth, never merged with local state.
//! Entries past their reset time are garbage and get pruned; a live route
//! simply re-creates its bucket on the next response.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::header::HeaderMap;

/// Header carrying the remaining call count for the route's window.
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
/// Header carrying the window reset time (epoch seconds, fractional).
pub const HEADER_RESET: &str = "x-ratelimit-reset";
/// Header carrying the window's total quota.
pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
/// Header flagging a global (not route-scoped) limit.
pub const HEADER_GLOBAL: &str = "x-ratelimit-global";
/// Header carrying the wait before retrying a limited call.
pub const HEADER_RETRY_AFTER: &str = "retry-after";

/// Current wall-clock time as fractional epoch milliseconds.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn now_epoch_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64() * 1000.0)
}

/// Quota metadata extracted from one response's headers.
#[derive(Clone, Debug, Default)]
pub struct RateLimitHeaders {
    /// Remaining calls in the current window.
    pub remaining: Option<i64>,
    /// Window reset, fractional epoch seconds.
    pub reset_at_s: Option<f64>,
    /// Window ceiling.
    pub limit: Option<i64>,
    /// Server-provided wait on a rate-limited response.
    pub retry_after: Option<Duration>,
    /// Whether the limit is global rather than route-scoped.
    pub global: bool,
}

impl RateLimitHeaders {
    /// Extract quota metadata from response headers. Absent or malformed
    /// headers yield `None` fields; nothing here is fatal.
    #[must_use]
    pub fn parse(headers: &HeaderMap) -> Self {
        let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        Self {
            remaining: text(HEADER_REMAINING).and_then(|v| v.parse().ok()),
            reset_at_s: text(HEADER_RESET).and_then(|v| v.parse().ok()),
            limit: text(HEADER_LIMIT).and_then(|v| v.parse().ok()),
            retry_after: text(HEADER_RETRY_AFTER).and_then(pylon_core::parse_retry_after),
            global: text(HEADER_GLOBAL).is_some_and(|v| v.eq_ignore_ascii_case("true")),
        }
    }

    /// Whether this response carried enough metadata to (re)create a bucket.
    #[must_use]
    pub fn has_quota(&self) -> bool {
        self.remaining.is_some() && self.reset_at_s.is_some()
    }
}

/// Rate-limit accounting record for one normalized route.
#[derive(Clone, Debug)]
pub struct RateLimitBucket {
    /// Remaining calls in the window. The server may report values at or
    /// below zero; the scheduler checks `<= 0`, never exact equality.
    pub remaining: i64,
    /// Window reset, fractional epoch milliseconds.
    pub reset_at_ms: f64,
    /// Window ceiling.
    pub limit: i64,
    /// Wall-clock time of the response that wrote this bucket, epoch ms.
    pub updated_at_ms: f64,
}

/// Registry of per-route buckets keyed by `METHOD /normalized/path`.
#[derive(Debug, Default)]
pub struct BucketRegistry {
    buckets: HashMap<String, RateLimitBucket>,
}

impl BucketRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the bucket for `route_key` from response headers.
    ///
    /// A no-op when the response carried no quota metadata.
    pub fn update(&mut self, route_key: &str, headers: &RateLimitHeaders, now_ms: f64) {
        let (Some(remaining), Some(reset_at_s)) = (headers.remaining, headers.reset_at_s) else {
            return;
        };
        let _ = self.buckets.insert(
            route_key.to_string(),
            RateLimitBucket {
                remaining,
                reset_at_ms: reset_at_s * 1000.0,
                limit: headers.limit.unwrap_or(0),
                updated_at_ms: now_ms,
            },
        );
    }

    /// How long the route is blocked, if its quota is exhausted and the
    /// window has not reset yet.
    #[must_use]
    pub fn blocked_for(&self, route_key: &str, now_ms: f64) -> Option<Duration> {
        let bucket = self.buckets.get(route_key)?;
        if bucket.remaining <= 0 && now_ms < bucket.reset_at_ms {
            Some(Duration::from_secs_f64(
                (bucket.reset_at_ms - now_ms) / 1000.0,
            ))
        } else {
            None
        }
    }

    /// Drop buckets whose reset time has passed. They are no longer
    /// authoritative and re-create themselves on the next response.
    pub fn prune(&mut self, now_ms: f64) {
        self.buckets.retain(|_, b| b.reset_at_ms > now_ms);
    }

    /// Look up a bucket for inspection.
    #[must_use]
    pub fn get(&self, route_key: &str) -> Option<&RateLimitBucket> {
        self.buckets.get(route_key)
    }

    /// Number of tracked routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Whether no routes are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers_with(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            let _ = map.insert(
                reqwest::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn parse_full_quota_headers() {
        let map = headers_with(&[
            (HEADER_REMAINING, "4"),
            (HEADER_RESET, "1700000000.25"),
            (HEADER_LIMIT, "5"),
        ]);
        let parsed = RateLimitHeaders::parse(&map);
        assert_eq!(parsed.remaining, Some(4));
        assert_eq!(parsed.limit, Some(5));
        assert!((parsed.reset_at_s.unwrap() - 1_700_000_000.25).abs() < f64::EPSILON);
        assert!(parsed.has_quota());
        assert!(!parsed.global);
    }

    #[test]
    fn parse_missing_headers_is_empty() {
        let parsed = RateLimitHeaders::parse(&HeaderMap::new());
        assert!(!parsed.has_quota());
        assert_eq!(parsed.retry_after, None);
    }

    #[test]
    fn parse_global_flag() {
        let map = headers_with(&[(HEADER_GLOBAL, "true"), (HEADER_RETRY_AFTER, "2")]);
        let parsed = RateLimitHeaders::parse(&map);
        assert!(parsed.global);
        assert_eq!(parsed.retry_after, Some(Duration::from_secs(2)));
    }

    #[test]
    fn parse_malformed_values_are_none() {
        let map = headers_with(&[(HEADER_REMAINING, "lots"), (HEADER_RESET, "later")]);
        let parsed = RateLimitHeaders::parse(&map);
        assert!(!parsed.has_quota());
    }

    #[test]
    fn update_creates_bucket_lazily() {
        let mut registry = BucketRegistry::new();
        assert!(registry.is_empty());

        let headers = RateLimitHeaders {
            remaining: Some(3),
            reset_at_s: Some(1000.0),
            limit: Some(5),
            ..Default::default()
        };
        registry.update("GET /channels/:id", &headers, 0.0);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("GET /channels/:id").unwrap().remaining, 3);
    }

    #[test]
    fn update_overwrites_never_merges() {
        let mut registry = BucketRegistry::new();
        let first = RateLimitHeaders {
            remaining: Some(3),
            reset_at_s: Some(1000.0),
            limit: Some(5),
            ..Default::default()
        };
        registry.update("k", &first, 0.0);

        let second = RateLimitHeaders {
            remaining: Some(0),
            reset_at_s: Some(2000.0),
            limit: None,
            ..Default::default()
        };
        registry.update("k", &second, 0.0);

        let bucket = registry.get("k").unwrap();
        assert_eq!(bucket.remaining, 0);
        assert!((bucket.reset_at_ms - 2_000_000.0).abs() < f64::EPSILON);
        // limit absent in the second response: overwritten, not preserved
        assert_eq!(bucket.limit, 0);
    }

    #[test]
    fn update_without_quota_is_noop() {
        let mut registry = BucketRegistry::new();
        registry.update("k", &RateLimitHeaders::default(), 0.0);
        assert!(registry.is_empty());
    }

    #[test]
    fn blocked_when_exhausted_before_reset() {
        let mut registry = BucketRegistry::new();
        let headers = RateLimitHeaders {
            remaining: Some(0),
            reset_at_s: Some(10.5),
            ..Default::default()
        };
        registry.update("k", &headers, 10_000.0);

        let wait = registry.blocked_for("k", 10_000.0).unwrap();
        assert!((wait.as_secs_f64() - 0.5).abs() < 0.001);
    }

    #[test]
    fn negative_remaining_still_blocks() {
        let mut registry = BucketRegistry::new();
        let headers = RateLimitHeaders {
            remaining: Some(-2),
            reset_at_s: Some(10.0),
            ..Default::default()
        };
        registry.update("k", &headers, 5_000.0);
        assert!(registry.blocked_for("k", 5_000.0).is_some());
    }

    #[test]
    fn not_blocked_after_reset_passes() {
        let mut registry = BucketRegistry::new();
        let headers = RateLimitHeaders {
            remaining: Some(0),
            reset_at_s: Some(10.0),
            ..Default::default()
        };
        registry.update("k", &headers, 5_000.0);
        assert!(registry.blocked_for("k", 11_000.0).is_none());
    }

    #[test]
    fn not_blocked_with_quota_left() {
        let mut registry = BucketRegistry::new();
        let headers = RateLimitHeaders {
            remaining: Some(1),
            reset_at_s: Some(10.0),
            ..Default::default()
        };
        registry.update("k", &headers, 5_000.0);
        assert!(registry.blocked_for("k", 5_000.0).is_none());
    }

    #[test]
    fn unknown_route_is_never_blocked() {
        let registry = BucketRegistry::new();
        assert!(registry.blocked_for("nope", 0.0).is_none());
    }

    #[test]
    fn prune_drops_expired_buckets() {
        let mut registry = BucketRegistry::new();
        let expired = RateLimitHeaders {
            remaining: Some(0),
            reset_at_s: Some(10.0),
            ..Default::default()
        };
        let live = RateLimitHeaders {
            remaining: Some(2),
            reset_at_s: Some(100.0),
            ..Default::default()
        };
        registry.update("old", &expired, 0.0);
        registry.update("new", &live, 0.0);

        registry.prune(50_000.0);
        assert!(registry.get("old").is_none());
        assert!(registry.get("new").is_some());
    }
}
