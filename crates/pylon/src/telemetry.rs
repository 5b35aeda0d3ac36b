//! Tracing setup for applications embedding the client.

use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber with env-filter support.
///
/// Reads `RUST_LOG`, defaulting to `info`. Safe to call more than once;
/// later calls are no-ops when a global subscriber is already set.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
