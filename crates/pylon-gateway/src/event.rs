//! Gateway lifecycle and dispatch events.

use serde_json::Value;

use pylon_core::ReadyInfo;

/// Broadcast channel capacity for gateway events. Lagging subscribers
/// lose oldest events rather than blocking the connection task.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted by the connection state machine.
///
/// Abnormal network conditions surface here as [`GatewayEvent::Error`]
/// and [`GatewayEvent::Disconnected`]; the connection task never panics
/// or propagates them as `Err` values.
#[derive(Clone, Debug)]
pub enum GatewayEvent {
    /// Socket opened; handshake starting.
    Connected,
    /// Socket closed, with the close code and reason received or synthesized.
    Disconnected {
        /// WebSocket close code (1000 is a clean shutdown).
        code: u16,
        /// Close reason, possibly empty.
        reason: String,
    },
    /// Handshake completed; session identifier captured.
    Ready(ReadyInfo),
    /// An inbound push event, tagged with its event type.
    Dispatch {
        /// Event-type tag from the frame's `t` field.
        event_type: String,
        /// Raw dispatch payload.
        data: Value,
    },
    /// A recoverable connection error; the reconnect policy decides what
    /// happens next.
    Error(String),
    /// The reconnect attempt budget is spent. No further automatic
    /// attempts; the caller decides whether to call `connect()` again.
    ReconnectExhausted,
}
