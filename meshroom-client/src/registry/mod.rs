mod connection_registry;
mod peer_link;

pub use connection_registry::*;
pub use peer_link::*;
