use meshroom_core::IceServerConfig;
use meshroom_core::utils::default_ice_servers;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Settings for one relay process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    /// Pushed to every client in `ice-config` right after it connects.
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            ice_servers: default_ice_servers(),
        }
    }
}
