use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("permission to capture media was denied")]
    PermissionDenied,

    #[error("no capture device available: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("local media unavailable: {0}")]
    Media(#[from] MediaError),

    #[error("failed to reach the relay: {0}")]
    Relay(String),

    #[error("transport error: {0:#}")]
    Transport(#[from] anyhow::Error),
}
