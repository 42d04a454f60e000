use crate::transport::peer_transport::{PeerTransport, PeerTransportFactory, SdpKind};
use crate::transport::transport_event::{Connectivity, TransportEventKind, TransportEventSink};
use anyhow::{Context, Result};
use async_trait::async_trait;
use meshroom_core::{IceServerConfig, ParticipantId};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::offer_answer_options::RTCOfferOptions;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

pub type LocalTrack = Arc<dyn TrackLocal + Send + Sync>;

/// Creates native `webrtc` peer connections.
#[derive(Clone, Default)]
pub struct RtcTransportFactory {
    local_tracks: Vec<LocalTrack>,
    data_channel: Option<String>,
}

impl RtcTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks added to every link this factory creates.
    pub fn with_tracks(mut self, tracks: Vec<LocalTrack>) -> Self {
        self.local_tracks = tracks;
        self
    }

    /// Opens a data channel on every link. A link with neither tracks nor
    /// a data channel has nothing to negotiate.
    pub fn with_data_channel(mut self, label: impl Into<String>) -> Self {
        self.data_channel = Some(label.into());
        self
    }
}

#[async_trait]
impl PeerTransportFactory for RtcTransportFactory {
    async fn create(
        &self,
        remote_id: &ParticipantId,
        ice_servers: &[IceServerConfig],
        events: TransportEventSink,
    ) -> Result<Box<dyn PeerTransport>> {
        let transport = RtcTransport::new(
            remote_id.clone(),
            ice_servers,
            self.local_tracks.clone(),
            self.data_channel.clone(),
            events,
        )
        .await?;
        Ok(Box::new(transport))
    }
}

pub struct RtcTransport {
    remote_id: ParticipantId,
    peer_connection: Arc<RTCPeerConnection>,
    local_tracks: Vec<LocalTrack>,
    data_channel: Option<String>,
}

impl RtcTransport {
    pub async fn new(
        remote_id: ParticipantId,
        ice_servers: &[IceServerConfig],
        local_tracks: Vec<LocalTrack>,
        data_channel: Option<String>,
        events: TransportEventSink,
    ) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers.iter().map(to_rtc_ice_server).collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );

        let state_events = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let events = state_events.clone();
                Box::pin(async move {
                    info!("Connection to {} is {}", events.remote_id(), s);
                    if let Some(connectivity) = map_connectivity(s) {
                        events.emit(TransportEventKind::ConnectivityChanged(connectivity));
                    }
                })
            },
        ));

        let ice_events = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let Ok(value) = serde_json::to_value(&init) else {
                    return;
                };
                events.emit(TransportEventKind::CandidateGenerated(value));
            })
        }));

        let track_events = events.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let events = track_events.clone();
                Box::pin(async move {
                    let kind = track.kind().to_string();
                    debug!("Remote {} track from {}", kind, events.remote_id());
                    events.emit(TransportEventKind::TrackReceived {
                        track_id: track.id(),
                        kind,
                    });
                })
            },
        ));

        let dc_remote = remote_id.clone();
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let remote = dc_remote.clone();
            Box::pin(async move {
                debug!("Data channel '{}' opened by {}", dc.label(), remote);
            })
        }));

        Ok(Self {
            remote_id,
            peer_connection,
            local_tracks,
            data_channel,
        })
    }

    fn description(kind: SdpKind, sdp: String) -> Result<RTCSessionDescription> {
        let desc = match kind {
            SdpKind::Offer => RTCSessionDescription::offer(sdp)?,
            SdpKind::Answer => RTCSessionDescription::answer(sdp)?,
        };
        Ok(desc)
    }
}

#[async_trait]
impl PeerTransport for RtcTransport {
    async fn attach_local_tracks(&self) -> Result<()> {
        for track in &self.local_tracks {
            self.peer_connection
                .add_track(Arc::clone(track))
                .await
                .with_context(|| format!("Failed to add track '{}'", track.id()))?;
        }

        if let Some(label) = &self.data_channel {
            self.peer_connection
                .create_data_channel(label, None)
                .await
                .context("Failed to create data channel")?;
        }

        debug!(
            "Attached {} local tracks for {}",
            self.local_tracks.len(),
            self.remote_id
        );
        Ok(())
    }

    async fn create_offer(&self, ice_restart: bool) -> Result<String> {
        let options = ice_restart.then(|| RTCOfferOptions {
            ice_restart: true,
            ..Default::default()
        });
        let offer = self.peer_connection.create_offer(options).await?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self.peer_connection.create_answer(None).await?;
        Ok(answer.sdp)
    }

    async fn set_local_description(&self, kind: SdpKind, sdp: String) -> Result<()> {
        let desc = Self::description(kind, sdp)?;
        self.peer_connection.set_local_description(desc).await?;
        Ok(())
    }

    async fn set_remote_description(&self, kind: SdpKind, sdp: String) -> Result<()> {
        let desc = Self::description(kind, sdp)?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn rollback_local_offer(&self) -> Result<()> {
        let rollback: RTCSessionDescription =
            serde_json::from_value(json!({ "type": "rollback", "sdp": "" }))
                .context("Failed to build rollback description")?;
        self.peer_connection
            .set_local_description(rollback)
            .await
            .context("Rollback rejected")?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: serde_json::Value) -> Result<()> {
        let candidate: RTCIceCandidateInit =
            serde_json::from_value(candidate).context("Failed to parse ICE candidate JSON")?;
        self.peer_connection.add_ice_candidate(candidate).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

fn to_rtc_ice_server(server: &IceServerConfig) -> RTCIceServer {
    RTCIceServer {
        urls: server.urls.clone(),
        username: server.username.clone().unwrap_or_default(),
        credential: server.credential.clone().unwrap_or_default(),
        ..Default::default()
    }
}

fn map_connectivity(state: RTCPeerConnectionState) -> Option<Connectivity> {
    match state {
        RTCPeerConnectionState::Connecting => Some(Connectivity::Checking),
        RTCPeerConnectionState::Connected => Some(Connectivity::Connected),
        RTCPeerConnectionState::Disconnected => Some(Connectivity::Disconnected),
        RTCPeerConnectionState::Failed => Some(Connectivity::Failed),
        RTCPeerConnectionState::Closed => Some(Connectivity::Closed),
        _ => None,
    }
}
