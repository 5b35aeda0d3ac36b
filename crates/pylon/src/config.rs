//! Client configuration.
//!
//! Configuration comes from the embedding application, not from files:
//! a pre-obtained credential, a presence descriptor, capability flags,
//! and an API-version selector that shapes both the gateway URL and the
//! REST base path. Endpoint overrides exist for tests and self-hosted
//! deployments.

use serde::{Deserialize, Serialize};

use pylon_core::Presence;

/// Default API version.
pub const DEFAULT_API_VERSION: u8 = 9;
/// Production gateway host.
const GATEWAY_HOST: &str = "wss://gateway.pylon.chat";
/// Production REST host.
const REST_HOST: &str = "https://api.pylon.chat";

/// Configuration for a [`Client`](crate::client::Client).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Pre-obtained credential attached to every outbound call.
    pub token: String,
    /// API version selector.
    #[serde(default = "default_api_version")]
    pub api_version: u8,
    /// Presence descriptor sent with identify.
    #[serde(default)]
    pub presence: Presence,
    /// Capability bitflags sent with identify.
    #[serde(default)]
    pub intents: u64,
    /// Gateway URL override (tests, self-hosted deployments).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,
    /// REST base URL override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_base_url: Option<String>,
}

fn default_api_version() -> u8 {
    DEFAULT_API_VERSION
}

impl ClientConfig {
    /// Config with defaults for the given credential.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_version: DEFAULT_API_VERSION,
            presence: Presence::default(),
            intents: 0,
            gateway_url: None,
            rest_base_url: None,
        }
    }

    /// Set the presence descriptor.
    #[must_use]
    pub fn with_presence(mut self, presence: Presence) -> Self {
        self.presence = presence;
        self
    }

    /// Set the capability bitflags.
    #[must_use]
    pub fn with_intents(mut self, intents: u64) -> Self {
        self.intents = intents;
        self
    }

    /// Select the API version.
    #[must_use]
    pub fn with_api_version(mut self, version: u8) -> Self {
        self.api_version = version;
        self
    }

    /// The gateway URL to dial, honoring the override.
    #[must_use]
    pub fn gateway_url(&self) -> String {
        self.gateway_url.clone().unwrap_or_else(|| {
            format!("{GATEWAY_HOST}/?v={}&encoding=json", self.api_version)
        })
    }

    /// The REST base URL, honoring the override.
    #[must_use]
    pub fn rest_base_url(&self) -> String {
        self.rest_base_url
            .clone()
            .unwrap_or_else(|| format!("{REST_HOST}/v{}", self.api_version))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
