use crate::session::{LinkState, Role};
use crate::transport::PeerTransport;
use meshroom_core::ParticipantId;

/// Local record of the connection to one remote participant.
pub struct PeerLink {
    pub remote_id: ParticipantId,
    /// Tags transport events so a replaced link's late events are ignored.
    pub link_id: u64,
    pub role: Role,
    pub state: LinkState,
    pub transport: Box<dyn PeerTransport>,
    /// Remote candidates received before the remote description.
    pub pending_candidates: Vec<serde_json::Value>,
    pub remote_description_set: bool,
    /// A local offer has been applied and no answer has arrived yet.
    pub local_offer_pending: bool,
    pub restart_attempted: bool,
    /// Bumped whenever a deadline is armed or cancelled.
    pub deadline_generation: u64,
}

impl PeerLink {
    pub fn new(
        remote_id: ParticipantId,
        link_id: u64,
        role: Role,
        transport: Box<dyn PeerTransport>,
    ) -> Self {
        Self {
            remote_id,
            link_id,
            role,
            state: LinkState::Idle,
            transport,
            pending_candidates: Vec::new(),
            remote_description_set: false,
            local_offer_pending: false,
            restart_attempted: false,
            deadline_generation: 0,
        }
    }

    pub fn take_pending_candidates(&mut self) -> Vec<serde_json::Value> {
        std::mem::take(&mut self.pending_candidates)
    }
}
