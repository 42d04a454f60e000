use meshroom_core::{ParticipantId, RoomId};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

/// Membership bookkeeping for every room the relay knows about.
///
/// A room exists exactly while it has at least one member: it is created by
/// the first `join` and dropped by the `leave` that empties it.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, BTreeSet<ParticipantId>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `participant_id` to the room and returns the other members as
    /// they were right before this call. Re-joining is a no-op.
    pub fn join(&mut self, room_id: &RoomId, participant_id: &ParticipantId) -> Vec<ParticipantId> {
        let members = self.rooms.entry(room_id.clone()).or_insert_with(|| {
            info!("Creating room '{}'", room_id);
            BTreeSet::new()
        });

        let existing: Vec<ParticipantId> = members
            .iter()
            .filter(|id| *id != participant_id)
            .cloned()
            .collect();

        if members.insert(participant_id.clone()) {
            debug!("{} joined '{}' ({} members)", participant_id, room_id, members.len());
        }

        existing
    }

    /// Removes the participant. Returns whether it was a member.
    pub fn leave(&mut self, room_id: &RoomId, participant_id: &ParticipantId) -> bool {
        let Some(members) = self.rooms.get_mut(room_id) else {
            return false;
        };

        let removed = members.remove(participant_id);
        if members.is_empty() {
            self.rooms.remove(room_id);
            info!("Room '{}' is empty, removing it", room_id);
        }

        removed
    }

    pub fn members_of(&self, room_id: &RoomId) -> Vec<ParticipantId> {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, room_id: &RoomId, participant_id: &ParticipantId) -> bool {
        self.rooms
            .get(room_id)
            .is_some_and(|members| members.contains(participant_id))
    }

    pub fn has_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn rooms(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.keys().cloned().collect();
        ids.sort();
        ids
    }
}
