//! # pylon-gateway
//!
//! Persistent-connection state machine for the Pylon client:
//!
//! - **Handshake**: Hello challenge → identify → Ready
//! - **Heartbeat**: liveness frames at the server-provided cadence, with
//!   ack-timeout detection for stalled connections
//! - **Reconnect**: capped exponential backoff with an attempt budget
//! - **Dispatch**: inbound push events demultiplexed and fanned out to
//!   subscribers over a broadcast channel
//!
//! Connection-level failures are emitted as [`GatewayEvent`]s, never
//! returned as errors — many listeners may depend on one connection.

#![deny(unsafe_code)]

pub mod error;
pub mod event;
pub mod gateway;
pub mod heartbeat;
pub mod reconnect;
pub mod session;

pub use error::GatewayError;
pub use event::GatewayEvent;
pub use gateway::{Gateway, GatewayConfig};
pub use reconnect::ReconnectPolicy;
pub use session::{ConnectionState, Session};
