//! Per-link negotiation rules.
//!
//! [`decide`] maps the current view of a link and one event to the ordered
//! list of effects the orchestrator must carry out. It performs no I/O, so
//! every rule here can be checked without a peer connection.

use crate::session::state::{LinkState, Role};
use meshroom_core::ParticipantId;

/// The deterministic initiator policy: of any two participants, the one
/// with the lexicographically smaller id makes the offer.
pub fn is_initiator(local_id: &ParticipantId, remote_id: &ParticipantId) -> bool {
    local_id < remote_id
}

/// What `decide` needs to know about a link. `exists == false` describes a
/// remote we have no link to; the other fields are then ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkView {
    pub exists: bool,
    pub is_initiator: bool,
    pub state: LinkState,
    pub remote_description_set: bool,
    pub local_offer_pending: bool,
    pub restart_attempted: bool,
}

impl LinkView {
    pub fn absent(is_initiator: bool) -> Self {
        Self {
            exists: false,
            is_initiator,
            state: LinkState::Idle,
            remote_description_set: false,
            local_offer_pending: false,
            restart_attempted: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationEvent {
    /// The remote is in the room, from the roster or a `peer-joined`.
    PeerDiscovered,
    /// The local user asked to call the remote.
    CallRequested,
    OfferReceived,
    AnswerReceived,
    CandidateReceived,
    Connected,
    ConnectivityFailed,
    ConnectingDeadline,
    RestartDeadline,
    PeerLeft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    CreateLink(Role),
    AttachLocalTracks,
    SetRole(Role),
    /// Create an offer, apply it locally and send it.
    SendOffer,
    SendRestartOffer,
    /// Create an answer, apply it locally and send it.
    SendAnswer,
    RollbackLocalOffer,
    ApplyRemoteOffer,
    ApplyRemoteAnswer,
    ApplyCandidate,
    BufferCandidate,
    FlushCandidates,
    SetState(LinkState),
    MarkRestartAttempted,
    ArmConnectingDeadline,
    ArmRestartDeadline,
    CancelDeadlines,
    CloseLink,
    /// Drop the remote from the roster without touching any link.
    ForgetPeer,
    Ignore(&'static str),
}

pub fn decide(view: &LinkView, event: NegotiationEvent) -> Vec<Effect> {
    use Effect::*;
    use NegotiationEvent::*;

    if !view.exists {
        return match event {
            PeerDiscovered if view.is_initiator => open_as_initiator(),
            PeerDiscovered => vec![Ignore("waiting for the remote's offer")],
            CallRequested => open_as_initiator(),
            OfferReceived => vec![
                CreateLink(Role::Responder),
                AttachLocalTracks,
                ApplyRemoteOffer,
                FlushCandidates,
                SendAnswer,
                SetState(LinkState::Connecting),
                ArmConnectingDeadline,
            ],
            PeerLeft => vec![ForgetPeer],
            AnswerReceived | CandidateReceived => vec![Ignore("no link to this remote")],
            Connected | ConnectivityFailed | ConnectingDeadline | RestartDeadline => {
                vec![Ignore("link already gone")]
            }
        };
    }

    match event {
        PeerDiscovered => vec![Ignore("link already exists")],

        CallRequested if view.local_offer_pending => vec![Ignore("offer already outstanding")],
        CallRequested => vec![SendOffer],

        OfferReceived if view.local_offer_pending && view.is_initiator => {
            vec![Ignore("glare: keeping our own offer")]
        }
        OfferReceived if view.local_offer_pending => vec![
            RollbackLocalOffer,
            SetRole(Role::Responder),
            ApplyRemoteOffer,
            FlushCandidates,
            SendAnswer,
            SetState(LinkState::Connecting),
        ],
        OfferReceived => vec![ApplyRemoteOffer, FlushCandidates, SendAnswer],

        AnswerReceived if !view.local_offer_pending => vec![Ignore("no offer outstanding")],
        AnswerReceived => vec![ApplyRemoteAnswer, FlushCandidates],

        CandidateReceived if view.remote_description_set => vec![ApplyCandidate],
        CandidateReceived => vec![BufferCandidate],

        Connected if view.state == LinkState::Stable => vec![Ignore("already stable")],
        Connected => vec![SetState(LinkState::Stable), CancelDeadlines],

        ConnectivityFailed if view.restart_attempted => {
            vec![SetState(LinkState::Failed), CloseLink]
        }
        ConnectivityFailed if view.is_initiator => vec![
            MarkRestartAttempted,
            SetState(LinkState::Connecting),
            SendRestartOffer,
            ArmRestartDeadline,
        ],
        ConnectivityFailed => vec![
            MarkRestartAttempted,
            SetState(LinkState::Connecting),
            ArmRestartDeadline,
        ],

        ConnectingDeadline | RestartDeadline if view.state == LinkState::Stable => {
            vec![Ignore("connected before the deadline")]
        }
        ConnectingDeadline | RestartDeadline => vec![SetState(LinkState::Failed), CloseLink],

        PeerLeft => vec![CloseLink],
    }
}

fn open_as_initiator() -> Vec<Effect> {
    vec![
        Effect::CreateLink(Role::Initiator),
        Effect::AttachLocalTracks,
        Effect::SendOffer,
        Effect::SetState(LinkState::Connecting),
        Effect::ArmConnectingDeadline,
    ]
}
