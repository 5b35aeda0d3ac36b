//! Gateway wire frames.
//!
//! Every message on the persistent connection is a JSON envelope
//! `{op, d, s, t}`. The opcode selects the control path; dispatches
//! (op 0) additionally carry an event-type tag in `t` and a running
//! sequence number in `s`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Close code sent on an explicit, caller-initiated shutdown.
///
/// A close carrying this code is a clean shutdown and must never trigger
/// a reconnect attempt.
pub const CLEAN_CLOSE_CODE: u16 = 1000;

/// Operation codes recognized on the persistent connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    /// Inbound push event, demultiplexed by the `t` tag.
    Dispatch,
    /// Outbound liveness signal carrying the last-seen sequence number.
    Heartbeat,
    /// Outbound identification frame sent in response to Hello.
    Identify,
    /// Inbound handshake challenge carrying the heartbeat interval.
    Hello,
    /// Inbound acknowledgment of the most recent heartbeat.
    HeartbeatAck,
}

impl Opcode {
    /// Decode a raw opcode. Unrecognized values return `None`; the caller
    /// logs and drops the frame rather than failing the connection.
    #[must_use]
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Dispatch),
            1 => Some(Self::Heartbeat),
            2 => Some(Self::Identify),
            10 => Some(Self::Hello),
            11 => Some(Self::HeartbeatAck),
            _ => None,
        }
    }

    /// Raw wire value.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Dispatch => 0,
            Self::Heartbeat => 1,
            Self::Identify => 2,
            Self::Hello => 10,
            Self::HeartbeatAck => 11,
        }
    }
}

/// The JSON envelope exchanged over the persistent connection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayFrame {
    /// Operation code (raw; see [`Opcode::from_u8`]).
    pub op: u8,
    /// Opcode-specific payload.
    #[serde(default)]
    pub d: Value,
    /// Running sequence number, present on dispatches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    /// Event-type tag, present on dispatches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayFrame {
    /// Build an outbound heartbeat carrying the last-seen sequence number.
    #[must_use]
    pub fn heartbeat(sequence: Option<u64>) -> Self {
        Self {
            op: Opcode::Heartbeat.as_u8(),
            d: sequence.map_or(Value::Null, |s| json!(s)),
            s: None,
            t: None,
        }
    }

    /// Build an outbound identify frame.
    #[must_use]
    pub fn identify(payload: &IdentifyPayload) -> Self {
        Self {
            op: Opcode::Identify.as_u8(),
            d: serde_json::to_value(payload).unwrap_or(Value::Null),
            s: None,
            t: None,
        }
    }

    /// Decode the recognized opcode, if any.
    #[must_use]
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::from_u8(self.op)
    }
}

/// Payload of the inbound Hello control frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat cadence requested by the server, in milliseconds.
    pub heartbeat_interval: u64,
}

/// Payload of the handshake-complete (`READY`) dispatch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReadyInfo {
    /// Opaque session identifier assigned by the server.
    pub session_id: String,
    /// Remaining fields the server attaches (user, version, etc.).
    #[serde(flatten)]
    pub extra: Value,
}

/// Client/platform metadata sent with identify.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientProperties {
    /// Operating system name.
    pub os: String,
    /// Device identifier.
    pub device: String,
    /// Library identifier.
    pub library: String,
}

impl Default for ClientProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            device: "pylon".to_string(),
            library: "pylon".to_string(),
        }
    }
}

/// Presence descriptor attached to identify.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Presence {
    /// Presence status (`online`, `idle`, `dnd`, `invisible`).
    #[serde(default = "default_status")]
    pub status: String,
    /// Whether the client is marked away.
    #[serde(default)]
    pub afk: bool,
    /// Optional activity name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
}

fn default_status() -> String {
    "online".to_string()
}

/// Payload of the outbound identify frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentifyPayload {
    /// Pre-obtained credential attached verbatim.
    pub token: String,
    /// Client/platform metadata.
    pub properties: ClientProperties,
    /// Presence descriptor.
    pub presence: Presence,
    /// Capability bitflags.
    pub intents: u64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_round_trip() {
        for op in [
            Opcode::Dispatch,
            Opcode::Heartbeat,
            Opcode::Identify,
            Opcode::Hello,
            Opcode::HeartbeatAck,
        ] {
            assert_eq!(Opcode::from_u8(op.as_u8()), Some(op));
        }
    }

    #[test]
    fn opcode_unknown_is_none() {
        assert_eq!(Opcode::from_u8(3), None);
        assert_eq!(Opcode::from_u8(99), None);
    }

    #[test]
    fn heartbeat_frame_carries_sequence() {
        let frame = GatewayFrame::heartbeat(Some(42));
        assert_eq!(frame.op, 1);
        assert_eq!(frame.d, serde_json::json!(42));
        let json = serde_json::to_string(&frame).unwrap();
        // s and t are omitted entirely on outbound control frames
        assert!(!json.contains("\"s\""));
        assert!(!json.contains("\"t\""));
    }

    #[test]
    fn heartbeat_frame_null_before_first_event() {
        let frame = GatewayFrame::heartbeat(None);
        assert_eq!(frame.d, Value::Null);
    }

    #[test]
    fn identify_frame_shape() {
        let payload = IdentifyPayload {
            token: "tok".into(),
            properties: ClientProperties::default(),
            presence: Presence::default(),
            intents: 513,
        };
        let frame = GatewayFrame::identify(&payload);
        assert_eq!(frame.op, 2);
        assert_eq!(frame.d["token"], "tok");
        assert_eq!(frame.d["intents"], 513);
        assert_eq!(frame.d["presence"]["status"], "online");
    }

    #[test]
    fn inbound_hello_parses() {
        let raw = r#"{"op":10,"d":{"heartbeat_interval":45000}}"#;
        let frame: GatewayFrame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.opcode(), Some(Opcode::Hello));
        let hello: HelloPayload = serde_json::from_value(frame.d).unwrap();
        assert_eq!(hello.heartbeat_interval, 45_000);
    }

    #[test]
    fn inbound_dispatch_parses_with_nulls() {
        let raw = r#"{"op":0,"d":{"session_id":"abc","v":9},"s":1,"t":"READY"}"#;
        let frame: GatewayFrame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.s, Some(1));
        assert_eq!(frame.t.as_deref(), Some("READY"));
        let ready: ReadyInfo = serde_json::from_value(frame.d).unwrap();
        assert_eq!(ready.session_id, "abc");
        assert_eq!(ready.extra["v"], 9);
    }

    #[test]
    fn inbound_ack_parses_without_payload() {
        let raw = r#"{"op":11}"#;
        let frame: GatewayFrame = serde_json::from_str(raw).unwrap();
        assert_eq!(frame.opcode(), Some(Opcode::HeartbeatAck));
        assert_eq!(frame.d, Value::Null);
    }
}
