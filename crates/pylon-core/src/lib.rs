//! # pylon-core
//!
//! Shared building blocks for the Pylon realtime client:
//!
//! - **Wire frames**: the `{op, d, s, t}` JSON envelope spoken over the
//!   persistent connection, plus typed handshake payloads
//! - **Route keys**: method + normalized-path keys that group REST calls
//!   sharing a rate-limit quota
//! - **Backoff math**: reconnect and retry delay schedules, `Retry-After`
//!   parsing
//!
//! This crate is sync-only and IO-free; the gateway and REST crates supply
//! the async execution around these types.

#![deny(unsafe_code)]

pub mod backoff;
pub mod frame;
pub mod route;

pub use backoff::{parse_retry_after, transient_retry_delay};
pub use frame::{
    ClientProperties, GatewayFrame, HelloPayload, IdentifyPayload, Opcode, Presence, ReadyInfo,
    CLEAN_CLOSE_CODE,
};
pub use route::route_key;
