//! High-level client tying the gateway and the REST scheduler together.
//!
//! The two subsystems are deliberately independent: a gateway disconnect
//! neither cancels nor fails queued REST calls.

use tokio::sync::broadcast;
use tracing::info;

use pylon_core::{ClientProperties, IdentifyPayload};
use pylon_gateway::{Gateway, GatewayConfig, GatewayEvent};
use pylon_rest::{RequestScheduler, RestConfig};

use crate::config::ClientConfig;

/// A connected client instance: one persistent connection, one request
/// queue.
pub struct Client {
    gateway: Gateway,
    rest: RequestScheduler,
}

impl Client {
    /// Build a client from configuration. The REST scheduler starts
    /// immediately; the gateway dials on [`connect`](Self::connect).
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        let identify = IdentifyPayload {
            token: config.token.clone(),
            properties: ClientProperties::default(),
            presence: config.presence.clone(),
            intents: config.intents,
        };
        let gateway = Gateway::new(GatewayConfig::new(config.gateway_url(), identify));
        let rest = RequestScheduler::new(RestConfig::new(&config.token, config.rest_base_url()));
        Self { gateway, rest }
    }

    /// Open the persistent connection.
    pub fn connect(&self) {
        info!("opening gateway connection");
        self.gateway.connect();
    }

    /// Close the persistent connection cleanly. Never triggers a reconnect.
    pub fn disconnect(&self) {
        info!("closing gateway connection");
        self.gateway.disconnect();
    }

    /// Subscribe to gateway lifecycle and dispatch events.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<GatewayEvent> {
        self.gateway.subscribe()
    }

    /// The persistent-connection handle.
    #[must_use]
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// The outbound request scheduler.
    #[must_use]
    pub fn rest(&self) -> &RequestScheduler {
        &self.rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pylon_gateway::ConnectionState;

    #[tokio::test]
    async fn new_client_starts_disconnected() {
        let client = Client::new(&ClientConfig::new("token"));
        assert_eq!(client.gateway().state(), ConnectionState::Disconnected);
        // The scheduler is live even without a connection.
        let mut events = client.events();
        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
