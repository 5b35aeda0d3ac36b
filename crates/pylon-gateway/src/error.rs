//! Gateway errors.
//!
//! Only operations with a single obvious caller (`send`, `connect`)
//! return these; everything that happens on the connection itself is
//! emitted as a [`GatewayEvent`](crate::event::GatewayEvent).

/// Errors returned by gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// WebSocket transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// Frame could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No live connection task to accept the operation.
    #[error("not connected")]
    NotConnected,
}
