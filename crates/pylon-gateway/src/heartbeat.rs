//! Heartbeat timing and ack tracking.
//!
//! The connection task drives a [`Heartbeat`] from its select loop: each
//! tick either produces a liveness frame or reports that the previous
//! beat was never acknowledged, in which case the connection is treated
//! as stalled and torn down rather than waiting for the transport to
//! notice on its own.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Outcome of one heartbeat tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Beat {
    /// Send a liveness frame now.
    Send,
    /// The previous beat was never acknowledged; the connection is stalled.
    AckTimeout,
}

/// Interval timer with acknowledgment tracking.
#[derive(Debug)]
pub struct Heartbeat {
    timer: Interval,
    awaiting_ack: bool,
}

impl Heartbeat {
    /// Start a heartbeat at the server-provided cadence. The first beat
    /// fires one full interval after creation.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            timer,
            awaiting_ack: false,
        }
    }

    /// Wait for the next cadence tick.
    pub async fn tick(&mut self) {
        let _ = self.timer.tick().await;
    }

    /// Record the server's liveness acknowledgment.
    pub fn ack(&mut self) {
        self.awaiting_ack = false;
    }

    /// Account for a tick: either clear to send, or the previous beat
    /// went unacknowledged for a full interval.
    pub fn on_tick(&mut self) -> Beat {
        if self.awaiting_ack {
            Beat::AckTimeout
        } else {
            self.awaiting_ack = true;
            Beat::Send
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
