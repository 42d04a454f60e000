use crate::transport::transport_event::TransportEventSink;
use anyhow::Result;
use async_trait::async_trait;
use meshroom_core::{IceServerConfig, ParticipantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// One peer connection to one remote participant.
///
/// Implementations report candidates, connectivity and remote tracks
/// through the [`TransportEventSink`] they were created with.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn attach_local_tracks(&self) -> Result<()>;

    /// Generates an offer without applying it. `ice_restart` requests fresh
    /// ICE credentials.
    async fn create_offer(&self, ice_restart: bool) -> Result<String>;

    async fn create_answer(&self) -> Result<String>;

    async fn set_local_description(&self, kind: SdpKind, sdp: String) -> Result<()>;

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()>;

    /// Discards the local offer that is still waiting for an answer.
    async fn rollback_local_offer(&self) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: serde_json::Value) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Builds transports for new links.
#[async_trait]
pub trait PeerTransportFactory: Send + Sync {
    async fn create(
        &self,
        remote_id: &ParticipantId,
        ice_servers: &[IceServerConfig],
        events: TransportEventSink,
    ) -> Result<Box<dyn PeerTransport>>;
}
