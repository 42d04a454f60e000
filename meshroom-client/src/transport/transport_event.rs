use meshroom_core::ParticipantId;
use tokio::sync::mpsc;
use tracing::debug;

/// Connectivity as reported by the underlying peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Checking,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEventKind {
    /// A local candidate to trickle to the remote side.
    CandidateGenerated(serde_json::Value),
    ConnectivityChanged(Connectivity),
    TrackReceived { track_id: String, kind: String },
}

/// Something a transport reported, tagged with the link that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub remote_id: ParticipantId,
    /// Distinguishes a replaced link from its successor for the same remote.
    pub link_id: u64,
    pub kind: TransportEventKind,
}

/// Handed to every transport at creation; callbacks report through it.
#[derive(Debug, Clone)]
pub struct TransportEventSink {
    remote_id: ParticipantId,
    link_id: u64,
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportEventSink {
    pub fn new(
        remote_id: ParticipantId,
        link_id: u64,
        tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            remote_id,
            link_id,
            tx,
        }
    }

    pub fn remote_id(&self) -> &ParticipantId {
        &self.remote_id
    }

    pub fn link_id(&self) -> u64 {
        self.link_id
    }

    /// Never waits: the session may itself be blocked closing this link.
    pub fn emit(&self, kind: TransportEventKind) {
        let event = TransportEvent {
            remote_id: self.remote_id.clone(),
            link_id: self.link_id,
            kind,
        };
        if self.tx.send(event).is_err() {
            debug!("Session gone, dropping transport event for {}", self.remote_id);
        }
    }
}
