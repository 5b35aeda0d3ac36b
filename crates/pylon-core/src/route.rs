//! Rate-limit route keys.
//!
//! Calls that differ only in a numeric identifier share one server-side
//! quota, so the key collapses pure-numeric path segments onto a fixed
//! placeholder. Method and normalized path together form the key.

/// Placeholder substituted for pure-numeric path segments.
const ID_PLACEHOLDER: &str = ":id";

/// Compute the rate-limit route key for a method and endpoint path.
///
/// Path segments consisting solely of ASCII digits collapse to `:id`, so
/// `GET /channels/123/messages` and `GET /channels/456/messages` land in
/// the same bucket. Query strings are not part of the key.
///
/// Note: segments are normalized independently, so routes the server
/// tracks as compound keys (e.g. channel + message together) merge into
/// one bucket here.
#[must_use]
pub fn route_key(method: &str, path: &str) -> String {
    let path = path.split('?').next().unwrap_or(path);
    let normalized: Vec<&str> = path
        .split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                ID_PLACEHOLDER
            } else {
                segment
            }
        })
        .collect();
    format!("{} {}", method.to_uppercase(), normalized.join("/"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
