use meshroom_core::{ParticipantId, RoomId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Relay-side handle of one connected transport.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Hash, Eq, PartialEq)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The room and identity a session currently speaks for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionRecord {
    pub room_id: RoomId,
    pub participant_id: ParticipantId,
}

impl SessionRecord {
    pub fn new(room_id: RoomId, participant_id: ParticipantId) -> Self {
        Self {
            room_id,
            participant_id,
        }
    }
}
