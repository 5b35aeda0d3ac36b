//! Reconnect attempt budget and backoff schedule.

use std::time::Duration;

use pylon_core::backoff::{MAX_RECONNECT_ATTEMPTS, RECONNECT_BASE_MS, RECONNECT_CAP_MS};

/// Backoff schedule shared by the connection state machine.
///
/// The attempt counter increments on every abnormal disconnect and resets
/// only on a fully completed handshake, so repeated quick failures
/// escalate the delay monotonically until success or exhaustion.
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    attempts: u32,
    max_attempts: u32,
    base: Duration,
    cap: Duration,
}

impl ReconnectPolicy {
    /// Policy with the production schedule: base 1s, cap 30s, 5 attempts.
    #[must_use]
    pub fn new() -> Self {
        Self::with_schedule(
            Duration::from_millis(RECONNECT_BASE_MS),
            Duration::from_millis(RECONNECT_CAP_MS),
            MAX_RECONNECT_ATTEMPTS,
        )
    }

    /// Policy with an explicit schedule (tests use short delays).
    #[must_use]
    pub fn with_schedule(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            base,
            cap,
        }
    }

    /// Account for an abnormal disconnect.
    ///
    /// Returns the delay before the next attempt, or `None` when the
    /// budget is spent and no further automatic attempt may be made.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        let exponential = self
            .base
            .saturating_mul(1u32 << self.attempts.min(31));
        Some(exponential.min(self.cap))
    }

    /// Reset the budget. Called only when the handshake fully completes.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Abnormal disconnects since the last completed handshake.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
