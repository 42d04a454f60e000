use crate::relay::SessionId;
use meshroom_core::{ParticipantId, RoomId, SignalKind};
use thiserror::Error;

/// Faults raised while handling a single inbound message. Each one is
/// scoped to the session that sent the message.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("session {0} sent a negotiation message before joining a room")]
    NotJoined(SessionId),

    #[error("sender '{claimed}' does not match session participant '{actual}'")]
    SenderMismatch {
        claimed: ParticipantId,
        actual: ParticipantId,
    },

    #[error("message addressed to room '{claimed}' but session is in '{actual}'")]
    RoomMismatch { claimed: RoomId, actual: RoomId },

    #[error("clients may not send '{0}' messages")]
    RelayOnlyKind(SignalKind),

    #[error("relay is not running")]
    Closed,
}

impl RelayError {
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::NotJoined(_) => "not-joined",
            RelayError::SenderMismatch { .. } => "sender-mismatch",
            RelayError::RoomMismatch { .. } => "room-mismatch",
            RelayError::RelayOnlyKind(_) => "relay-only-kind",
            RelayError::Closed => "relay-closed",
        }
    }
}
