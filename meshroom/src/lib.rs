pub use meshroom_core::{ParticipantId, RoomId, SignalMessage};

pub mod model {
    pub use meshroom_core::model::*;
    pub use meshroom_core::utils::default_ice_servers;
}

#[cfg(feature = "server")]
pub mod server {
    pub use meshroom_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use meshroom_client::*;
}
