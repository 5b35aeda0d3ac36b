//! Per-connection session state.
//!
//! One [`Session`] value is owned exclusively by the connection task and
//! replaced wholesale on every reconnect attempt. No other code path
//! mutates it.

use std::time::Duration;

/// Lifecycle states of the persistent connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket. Initial state, and the terminal state after any close.
    Disconnected,
    /// Dialing the gateway URL.
    Connecting,
    /// Socket open, waiting for the server's Hello challenge.
    AwaitingHello,
    /// Identify sent, waiting for the handshake-complete dispatch.
    Identifying,
    /// Handshake complete; dispatches flowing.
    Ready,
    /// Caller-initiated shutdown in progress.
    Closing,
}

/// State carried across one connection's lifetime.
#[derive(Clone, Debug)]
pub struct Session {
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// Last-seen server sequence number; echoed in heartbeats.
    pub sequence: Option<u64>,
    /// Opaque session identifier captured at handshake completion.
    pub session_id: Option<String>,
    /// Heartbeat cadence from the Hello payload.
    pub heartbeat_interval: Duration,
}

impl Session {
    /// Fresh session for a new connection attempt.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Connecting,
            sequence: None,
            session_id: None,
            heartbeat_interval: Duration::ZERO,
        }
    }

    /// Record a sequence number from an inbound frame. Last write wins;
    /// the most recent value rides on the next heartbeat.
    pub fn observe_sequence(&mut self, sequence: Option<u64>) {
        if sequence.is_some() {
            self.sequence = sequence;
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
