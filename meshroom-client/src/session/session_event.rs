use crate::session::state::LinkState;
use meshroom_core::ParticipantId;

/// Observable changes, broadcast to anything subscribed to a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    LinkStateChanged {
        remote_id: ParticipantId,
        state: LinkState,
    },
    TrackReceived {
        remote_id: ParticipantId,
        track_id: String,
        kind: String,
    },
    /// The link failed for good; the remote is out of this session's mesh.
    PeerUnreachable { remote_id: ParticipantId },
    RelayError { code: String, message: String },
}

/// Requests from the embedding application to a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Call(ParticipantId),
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeadlineKind {
    Connecting,
    Restart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Deadline {
    pub remote_id: ParticipantId,
    pub link_id: u64,
    pub generation: u64,
    pub kind: DeadlineKind,
}
