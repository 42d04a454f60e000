use meshroom_core::IceServerConfig;
use meshroom_core::utils::default_ice_servers;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-participant negotiation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Used until the relay pushes its own `ice-config`.
    pub ice_servers: Vec<IceServerConfig>,
    /// A link still connecting after this long is failed and dropped.
    pub connecting_timeout_ms: u64,
    /// Grace period for the single ICE restart after a connectivity failure.
    pub ice_restart_timeout_ms: u64,
}

impl SessionConfig {
    pub fn connecting_timeout(&self) -> Duration {
        Duration::from_millis(self.connecting_timeout_ms)
    }

    pub fn ice_restart_timeout(&self) -> Duration {
        Duration::from_millis(self.ice_restart_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ice_servers: default_ice_servers(),
            connecting_timeout_ms: 30_000,
            ice_restart_timeout_ms: 10_000,
        }
    }
}
