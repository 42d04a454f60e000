use crate::relay::session::SessionId;
use meshroom_core::{ParticipantId, RoomId, SignalMessage};
use serde::Serialize;
use tokio::sync::oneshot;

/// Commands the relay actor consumes, in arrival order.
#[derive(Debug)]
pub enum RelayCommand {
    /// A transport connected; its outbound channel is already in the directory.
    Connect { session_id: SessionId },

    /// A decoded message read from a session's transport.
    Inbound {
        session_id: SessionId,
        message: SignalMessage,
    },

    /// The transport closed, gracefully or not.
    Disconnect { session_id: SessionId },

    MembersOf {
        room_id: RoomId,
        reply: oneshot::Sender<Vec<ParticipantId>>,
    },

    Stats { reply: oneshot::Sender<RelayStats> },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    pub rooms: usize,
    pub sessions: usize,
    pub joined_sessions: usize,
}
