
use meshroom_core::utils::default_ice_servers;
use meshroom_server::RelayHandle;
use tracing::Level;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn create_test_relay() -> RelayHandle {
    RelayHandle::spawn(default_ice_servers())
}
