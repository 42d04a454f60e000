use crate::model::participant::ParticipantId;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// Every message exchanged between a participant and the relay.
///
/// `offer`, `answer` and `ice-candidate` are addressed to exactly one
/// `receiver_id`; the relay forwards them untouched and never reads `sdp`
/// or `candidate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum SignalMessage {
    JoinRoom {
        room_id: RoomId,
        participant_id: ParticipantId,
    },
    LeaveRoom {
        room_id: RoomId,
        participant_id: ParticipantId,
    },
    Roster {
        room_id: RoomId,
        participants: Vec<ParticipantId>,
    },
    PeerJoined {
        room_id: RoomId,
        participant_id: ParticipantId,
    },
    PeerLeft {
        room_id: RoomId,
        participant_id: ParticipantId,
    },
    Offer {
        room_id: RoomId,
        sender_id: ParticipantId,
        receiver_id: ParticipantId,
        sdp: String,
    },
    Answer {
        room_id: RoomId,
        sender_id: ParticipantId,
        receiver_id: ParticipantId,
        sdp: String,
    },
    IceCandidate {
        room_id: RoomId,
        sender_id: ParticipantId,
        receiver_id: ParticipantId,
        candidate: serde_json::Value,
    },
    IceConfig {
        ice_servers: Vec<IceServerConfig>,
    },
    Error {
        code: String,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    JoinRoom,
    LeaveRoom,
    Roster,
    PeerJoined,
    PeerLeft,
    Offer,
    Answer,
    IceCandidate,
    IceConfig,
    Error,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::JoinRoom => "join-room",
            SignalKind::LeaveRoom => "leave-room",
            SignalKind::Roster => "roster",
            SignalKind::PeerJoined => "peer-joined",
            SignalKind::PeerLeft => "peer-left",
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ice-candidate",
            SignalKind::IceConfig => "ice-config",
            SignalKind::Error => "error",
        }
    }

    /// Kinds only the relay may emit.
    pub fn is_relay_only(&self) -> bool {
        matches!(
            self,
            SignalKind::Roster
                | SignalKind::PeerJoined
                | SignalKind::PeerLeft
                | SignalKind::IceConfig
                | SignalKind::Error
        )
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SignalMessage {
    pub fn kind(&self) -> SignalKind {
        match self {
            SignalMessage::JoinRoom { .. } => SignalKind::JoinRoom,
            SignalMessage::LeaveRoom { .. } => SignalKind::LeaveRoom,
            SignalMessage::Roster { .. } => SignalKind::Roster,
            SignalMessage::PeerJoined { .. } => SignalKind::PeerJoined,
            SignalMessage::PeerLeft { .. } => SignalKind::PeerLeft,
            SignalMessage::Offer { .. } => SignalKind::Offer,
            SignalMessage::Answer { .. } => SignalKind::Answer,
            SignalMessage::IceCandidate { .. } => SignalKind::IceCandidate,
            SignalMessage::IceConfig { .. } => SignalKind::IceConfig,
            SignalMessage::Error { .. } => SignalKind::Error,
        }
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            SignalMessage::JoinRoom { room_id, .. }
            | SignalMessage::LeaveRoom { room_id, .. }
            | SignalMessage::Roster { room_id, .. }
            | SignalMessage::PeerJoined { room_id, .. }
            | SignalMessage::PeerLeft { room_id, .. }
            | SignalMessage::Offer { room_id, .. }
            | SignalMessage::Answer { room_id, .. }
            | SignalMessage::IceCandidate { room_id, .. } => Some(room_id),
            SignalMessage::IceConfig { .. } | SignalMessage::Error { .. } => None,
        }
    }

    /// Sender and receiver of a directed negotiation message.
    pub fn route(&self) -> Option<(&ParticipantId, &ParticipantId)> {
        match self {
            SignalMessage::Offer {
                sender_id,
                receiver_id,
                ..
            }
            | SignalMessage::Answer {
                sender_id,
                receiver_id,
                ..
            }
            | SignalMessage::IceCandidate {
                sender_id,
                receiver_id,
                ..
            } => Some((sender_id, receiver_id)),
            _ => None,
        }
    }

    pub fn is_directed(&self) -> bool {
        self.route().is_some()
    }
}
