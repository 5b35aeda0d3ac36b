//! # pylon
//!
//! Client for a realtime, event-driven remote service: a persistent
//! gateway connection for push events plus a serialized, rate-limit-aware
//! REST scheduler for outbound calls.
//!
//! ```no_run
//! use pylon::{Client, ClientConfig};
//!
//! # async fn run() {
//! let client = Client::new(&ClientConfig::new("my-token"));
//! let mut events = client.events();
//! client.connect();
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # }
//! ```

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod telemetry;

pub use client::Client;
pub use config::ClientConfig;

pub use pylon_core::{ClientProperties, GatewayFrame, IdentifyPayload, Opcode, Presence};
pub use pylon_gateway::{ConnectionState, Gateway, GatewayError, GatewayEvent};
pub use pylon_rest::{RequestScheduler, RestConfig, RestError};
