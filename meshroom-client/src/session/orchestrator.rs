use crate::config::SessionConfig;
use crate::error::ClientError;
use crate::media::MediaSource;
use crate::registry::{ConnectionRegistry, PeerLink};
use crate::session::negotiation::{Effect, LinkView, NegotiationEvent, decide, is_initiator};
use crate::session::session_event::{Deadline, DeadlineKind, SessionCommand, SessionEvent};
use crate::session::state::{LinkState, Role};
use crate::signaling::SignalingOutput;
use crate::transport::{
    Connectivity, PeerTransportFactory, SdpKind, TransportEvent, TransportEventKind,
};
use anyhow::{Context, Result, anyhow};
use meshroom_core::{ParticipantId, RoomId, SignalMessage};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const SESSION_EVENT_BUFFER: usize = 64;
const COMMAND_BUFFER: usize = 16;

/// Data carried by the signal that triggered a negotiation step.
enum Payload {
    None,
    Sdp(String),
    Candidate(serde_json::Value),
}

impl Payload {
    fn take_sdp(&mut self) -> Result<String> {
        match std::mem::replace(self, Payload::None) {
            Payload::Sdp(sdp) => Ok(sdp),
            _ => Err(anyhow!("negotiation step needs an SDP payload")),
        }
    }

    fn take_candidate(&mut self) -> Result<serde_json::Value> {
        match std::mem::replace(self, Payload::None) {
            Payload::Candidate(candidate) => Ok(candidate),
            _ => Err(anyhow!("negotiation step needs a candidate payload")),
        }
    }
}

/// Drives every link of one local participant in one room.
///
/// Relay signals, transport events and deadlines are all handled on the
/// task that owns the orchestrator, one at a time, so events for the same
/// remote are applied in arrival order.
pub struct SessionOrchestrator {
    local_id: ParticipantId,
    room_id: RoomId,
    config: SessionConfig,
    registry: ConnectionRegistry,
    roster: BTreeSet<ParticipantId>,
    signaling: Arc<dyn SignalingOutput>,
    media: Arc<dyn MediaSource>,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    deadline_tx: mpsc::UnboundedSender<Deadline>,
    deadline_rx: mpsc::UnboundedReceiver<Deadline>,
    events_tx: broadcast::Sender<SessionEvent>,
    joined: bool,
}

impl SessionOrchestrator {
    pub fn new(
        local_id: ParticipantId,
        room_id: RoomId,
        config: SessionConfig,
        factory: Arc<dyn PeerTransportFactory>,
        signaling: Arc<dyn SignalingOutput>,
        media: Arc<dyn MediaSource>,
    ) -> Self {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (deadline_tx, deadline_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(SESSION_EVENT_BUFFER);
        let registry = ConnectionRegistry::new(factory, config.ice_servers.clone(), transport_tx);

        Self {
            local_id,
            room_id,
            config,
            registry,
            roster: BTreeSet::new(),
            signaling,
            media,
            transport_rx,
            deadline_tx,
            deadline_rx,
            events_tx,
            joined: false,
        }
    }

    pub fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    /// Remote participants currently known to be in the room.
    pub fn roster(&self) -> Vec<ParticipantId> {
        self.roster.iter().cloned().collect()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn link_state(&self, remote_id: &ParticipantId) -> Option<LinkState> {
        self.registry.get(remote_id).map(|link| link.state)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// Acquires local media and asks the relay to join the room. Nothing is
    /// sent if media cannot be acquired.
    pub async fn join(&mut self) -> Result<(), ClientError> {
        if self.joined {
            debug!("{} already joined '{}'", self.local_id, self.room_id);
            return Ok(());
        }

        self.media.acquire().await?;
        self.joined = true;
        info!("{} joining '{}'", self.local_id, self.room_id);

        self.signaling
            .send_signal(SignalMessage::JoinRoom {
                room_id: self.room_id.clone(),
                participant_id: self.local_id.clone(),
            })
            .await;
        Ok(())
    }

    /// Stops local media, closes every link and tells the relay.
    pub async fn leave(&mut self) {
        self.media.stop();

        for remote_id in self.registry.remote_ids() {
            self.emit(SessionEvent::LinkStateChanged {
                remote_id,
                state: LinkState::Closed,
            });
        }
        self.registry.close_all().await;
        self.roster.clear();

        if self.joined {
            self.joined = false;
            info!("{} leaving '{}'", self.local_id, self.room_id);
            self.signaling
                .send_signal(SignalMessage::LeaveRoom {
                    room_id: self.room_id.clone(),
                    participant_id: self.local_id.clone(),
                })
                .await;
        }
    }

    /// Offers to `remote_id` right away, whichever side the initiator
    /// policy would pick.
    pub async fn call(&mut self, remote_id: &ParticipantId) {
        if !self.joined {
            warn!("Cannot call {} before joining", remote_id);
            return;
        }
        self.negotiate(remote_id, NegotiationEvent::CallRequested, Payload::None)
            .await;
    }

    pub async fn handle_signal(&mut self, message: SignalMessage) {
        debug!("{} <- '{}'", self.local_id, message.kind());

        match message {
            SignalMessage::IceConfig { ice_servers } => {
                info!("Relay supplied {} ICE servers", ice_servers.len());
                self.registry.set_ice_servers(ice_servers);
            }

            SignalMessage::Roster {
                room_id,
                participants,
            } => {
                if !self.is_current_room(&room_id) {
                    return;
                }
                for remote_id in participants {
                    self.discover(remote_id).await;
                }
            }

            SignalMessage::PeerJoined {
                room_id,
                participant_id,
            } => {
                if self.is_current_room(&room_id) {
                    self.discover(participant_id).await;
                }
            }

            SignalMessage::PeerLeft {
                room_id,
                participant_id,
            } => {
                if self.is_current_room(&room_id) {
                    info!("{} left '{}'", participant_id, room_id);
                    self.negotiate(&participant_id, NegotiationEvent::PeerLeft, Payload::None)
                        .await;
                }
            }

            SignalMessage::Offer {
                room_id,
                sender_id,
                receiver_id,
                sdp,
            } => {
                if self.is_addressed_to_us(&room_id, &receiver_id) {
                    self.roster.insert(sender_id.clone());
                    self.negotiate(&sender_id, NegotiationEvent::OfferReceived, Payload::Sdp(sdp))
                        .await;
                }
            }

            SignalMessage::Answer {
                room_id,
                sender_id,
                receiver_id,
                sdp,
            } => {
                if self.is_addressed_to_us(&room_id, &receiver_id) {
                    self.negotiate(&sender_id, NegotiationEvent::AnswerReceived, Payload::Sdp(sdp))
                        .await;
                }
            }

            SignalMessage::IceCandidate {
                room_id,
                sender_id,
                receiver_id,
                candidate,
            } => {
                if self.is_addressed_to_us(&room_id, &receiver_id) {
                    self.negotiate(
                        &sender_id,
                        NegotiationEvent::CandidateReceived,
                        Payload::Candidate(candidate),
                    )
                    .await;
                }
            }

            SignalMessage::Error { code, message } => {
                warn!("Relay rejected a message from {}: {} ({})", self.local_id, message, code);
                self.emit(SessionEvent::RelayError { code, message });
            }

            SignalMessage::JoinRoom { .. } | SignalMessage::LeaveRoom { .. } => {
                debug!("Ignoring client-only message from the relay");
            }
        }
    }

    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        let TransportEvent {
            remote_id,
            link_id,
            kind,
        } = event;

        let current = self
            .registry
            .get(&remote_id)
            .is_some_and(|link| link.link_id == link_id);
        if !current {
            debug!("Ignoring event from stale link #{} to {}", link_id, remote_id);
            return;
        }

        match kind {
            TransportEventKind::CandidateGenerated(candidate) => {
                self.signaling
                    .send_signal(SignalMessage::IceCandidate {
                        room_id: self.room_id.clone(),
                        sender_id: self.local_id.clone(),
                        receiver_id: remote_id,
                        candidate,
                    })
                    .await;
            }
            TransportEventKind::ConnectivityChanged(Connectivity::Connected) => {
                self.negotiate(&remote_id, NegotiationEvent::Connected, Payload::None)
                    .await;
            }
            TransportEventKind::ConnectivityChanged(Connectivity::Failed) => {
                warn!("Connectivity to {} failed", remote_id);
                self.negotiate(&remote_id, NegotiationEvent::ConnectivityFailed, Payload::None)
                    .await;
            }
            TransportEventKind::ConnectivityChanged(other) => {
                debug!("Link to {} reports {:?}", remote_id, other);
            }
            TransportEventKind::TrackReceived { track_id, kind } => {
                info!("Receiving {} from {}", kind, remote_id);
                self.emit(SessionEvent::TrackReceived {
                    remote_id,
                    track_id,
                    kind,
                });
            }
        }
    }

    async fn handle_deadline(&mut self, deadline: Deadline) {
        let current = self.registry.get(&deadline.remote_id).is_some_and(|link| {
            link.link_id == deadline.link_id && link.deadline_generation == deadline.generation
        });
        if !current {
            return;
        }

        let event = match deadline.kind {
            DeadlineKind::Connecting => NegotiationEvent::ConnectingDeadline,
            DeadlineKind::Restart => NegotiationEvent::RestartDeadline,
        };
        warn!("{:?} deadline for {} expired", deadline.kind, deadline.remote_id);
        self.negotiate(&deadline.remote_id, event, Payload::None).await;
    }

    /// Handles every transport event and expired deadline that is already
    /// queued, without waiting for more. Returns how many were handled.
    pub async fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        loop {
            if let Ok(event) = self.transport_rx.try_recv() {
                self.handle_transport_event(event).await;
            } else if let Ok(deadline) = self.deadline_rx.try_recv() {
                self.handle_deadline(deadline).await;
            } else {
                return handled;
            }
            handled += 1;
        }
    }

    /// Runs until `Leave` is requested, the command channel closes or the
    /// relay connection drops. Local links are closed in every case.
    pub async fn run(
        mut self,
        mut inbound: mpsc::UnboundedReceiver<SignalMessage>,
        mut commands: mpsc::Receiver<SessionCommand>,
    ) {
        info!("Session {} in '{}' started", self.local_id, self.room_id);

        loop {
            tokio::select! {
                message = inbound.recv() => match message {
                    Some(message) => self.handle_signal(message).await,
                    None => {
                        warn!("Relay connection lost, closing all links");
                        self.leave().await;
                        break;
                    }
                },

                Some(event) = self.transport_rx.recv() => {
                    self.handle_transport_event(event).await;
                }

                Some(deadline) = self.deadline_rx.recv() => {
                    self.handle_deadline(deadline).await;
                }

                command = commands.recv() => match command {
                    Some(SessionCommand::Call(remote_id)) => self.call(&remote_id).await,
                    Some(SessionCommand::Leave) | None => {
                        self.leave().await;
                        break;
                    }
                },
            }
        }

        info!("Session {} in '{}' finished", self.local_id, self.room_id);
    }

    /// Moves the session onto its own task.
    pub fn spawn(self, inbound: mpsc::UnboundedReceiver<SignalMessage>) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let events = self.events_tx.subscribe();
        let task = tokio::spawn(self.run(inbound, command_rx));

        SessionHandle {
            command_tx,
            events,
            task,
        }
    }

    async fn discover(&mut self, remote_id: ParticipantId) {
        if remote_id == self.local_id {
            return;
        }
        self.roster.insert(remote_id.clone());
        self.negotiate(&remote_id, NegotiationEvent::PeerDiscovered, Payload::None)
            .await;
    }

    fn is_current_room(&self, room_id: &RoomId) -> bool {
        if !self.joined || *room_id != self.room_id {
            debug!("Ignoring signal for room '{}'", room_id);
            return false;
        }
        true
    }

    fn is_addressed_to_us(&self, room_id: &RoomId, receiver_id: &ParticipantId) -> bool {
        if *receiver_id != self.local_id {
            warn!("Received a signal addressed to {}", receiver_id);
            return false;
        }
        self.is_current_room(room_id)
    }

    fn view_of(&self, remote_id: &ParticipantId) -> LinkView {
        let initiator = is_initiator(&self.local_id, remote_id);
        match self.registry.get(remote_id) {
            Some(link) => LinkView {
                exists: true,
                is_initiator: initiator,
                state: link.state,
                remote_description_set: link.remote_description_set,
                local_offer_pending: link.local_offer_pending,
                restart_attempted: link.restart_attempted,
            },
            None => LinkView::absent(initiator),
        }
    }

    async fn negotiate(
        &mut self,
        remote_id: &ParticipantId,
        event: NegotiationEvent,
        mut payload: Payload,
    ) {
        if *remote_id == self.local_id {
            debug!("Ignoring {:?} about ourselves", event);
            return;
        }

        let effects = decide(&self.view_of(remote_id), event);
        debug!("{} / {}: {:?} -> {:?}", self.local_id, remote_id, event, effects);

        for effect in effects {
            if let Err(e) = self.apply(remote_id, effect, &mut payload).await {
                error!("Negotiation with {} failed at {:?}: {:#}", remote_id, effect, e);
                self.fail_link(remote_id).await;
                return;
            }
        }
    }

    async fn apply(
        &mut self,
        remote_id: &ParticipantId,
        effect: Effect,
        payload: &mut Payload,
    ) -> Result<()> {
        match effect {
            Effect::CreateLink(role) => {
                self.registry.get_or_create(remote_id, role).await?;
                self.roster.insert(remote_id.clone());
            }

            Effect::AttachLocalTracks => {
                self.link_mut(remote_id)?
                    .transport
                    .attach_local_tracks()
                    .await?;
            }

            Effect::SetRole(role) => self.link_mut(remote_id)?.role = role,

            Effect::SendOffer => self.send_offer(remote_id, false).await?,

            Effect::SendRestartOffer => {
                info!("Restarting ICE with {}", remote_id);
                self.send_offer(remote_id, true).await?;
            }

            Effect::SendAnswer => self.send_answer(remote_id).await?,

            Effect::RollbackLocalOffer => self.rollback(remote_id).await?,

            Effect::ApplyRemoteOffer => {
                let sdp = payload.take_sdp()?;
                let link = self.link_mut(remote_id)?;
                link.transport
                    .set_remote_description(SdpKind::Offer, sdp)
                    .await
                    .context("Remote offer rejected")?;
                link.remote_description_set = true;
                link.local_offer_pending = false;
            }

            Effect::ApplyRemoteAnswer => {
                let sdp = payload.take_sdp()?;
                let link = self.link_mut(remote_id)?;
                link.transport
                    .set_remote_description(SdpKind::Answer, sdp)
                    .await
                    .context("Remote answer rejected")?;
                link.remote_description_set = true;
                link.local_offer_pending = false;
            }

            Effect::ApplyCandidate => {
                let candidate = payload.take_candidate()?;
                let link = self.link_mut(remote_id)?;
                if let Err(e) = link.transport.add_ice_candidate(candidate).await {
                    warn!("Dropping candidate from {}: {:#}", remote_id, e);
                }
            }

            Effect::BufferCandidate => {
                let candidate = payload.take_candidate()?;
                let link = self.link_mut(remote_id)?;
                link.pending_candidates.push(candidate);
                debug!(
                    "Buffered candidate from {} ({} pending)",
                    remote_id,
                    link.pending_candidates.len()
                );
            }

            Effect::FlushCandidates => {
                let link = self.link_mut(remote_id)?;
                let pending = link.take_pending_candidates();
                if !pending.is_empty() {
                    debug!("Applying {} buffered candidates from {}", pending.len(), remote_id);
                }
                for candidate in pending {
                    if let Err(e) = link.transport.add_ice_candidate(candidate).await {
                        warn!("Dropping buffered candidate from {}: {:#}", remote_id, e);
                    }
                }
            }

            Effect::SetState(state) => self.set_state(remote_id, state),

            Effect::MarkRestartAttempted => self.link_mut(remote_id)?.restart_attempted = true,

            Effect::ArmConnectingDeadline => {
                let after = self.config.connecting_timeout();
                self.arm_deadline(remote_id, DeadlineKind::Connecting, after);
            }

            Effect::ArmRestartDeadline => {
                let after = self.config.ice_restart_timeout();
                self.arm_deadline(remote_id, DeadlineKind::Restart, after);
            }

            Effect::CancelDeadlines => self.link_mut(remote_id)?.deadline_generation += 1,

            Effect::CloseLink => self.close_link(remote_id).await,

            Effect::ForgetPeer => {
                self.roster.remove(remote_id);
            }

            Effect::Ignore(reason) => debug!("Nothing to do for {}: {}", remote_id, reason),
        }

        Ok(())
    }

    fn link_mut(&mut self, remote_id: &ParticipantId) -> Result<&mut PeerLink> {
        self.registry
            .get_mut(remote_id)
            .ok_or_else(|| anyhow!("no link to {}", remote_id))
    }

    async fn send_offer(&mut self, remote_id: &ParticipantId, ice_restart: bool) -> Result<()> {
        let link = self.link_mut(remote_id)?;
        let sdp = link.transport.create_offer(ice_restart).await?;
        link.transport
            .set_local_description(SdpKind::Offer, sdp.clone())
            .await?;
        link.local_offer_pending = true;

        self.signaling
            .send_signal(SignalMessage::Offer {
                room_id: self.room_id.clone(),
                sender_id: self.local_id.clone(),
                receiver_id: remote_id.clone(),
                sdp,
            })
            .await;
        Ok(())
    }

    async fn send_answer(&mut self, remote_id: &ParticipantId) -> Result<()> {
        let link = self.link_mut(remote_id)?;
        let sdp = link.transport.create_answer().await?;
        link.transport
            .set_local_description(SdpKind::Answer, sdp.clone())
            .await?;

        self.signaling
            .send_signal(SignalMessage::Answer {
                room_id: self.room_id.clone(),
                sender_id: self.local_id.clone(),
                receiver_id: remote_id.clone(),
                sdp,
            })
            .await;
        Ok(())
    }

    /// Withdraws our pending offer. If the transport cannot roll back, the
    /// link is replaced by a fresh responder link.
    async fn rollback(&mut self, remote_id: &ParticipantId) -> Result<()> {
        let link = self.link_mut(remote_id)?;
        let rolled_back = link.transport.rollback_local_offer().await;

        match rolled_back {
            Ok(()) => {
                link.local_offer_pending = false;
                debug!("Rolled back our offer to {}", remote_id);
            }
            Err(e) => {
                warn!("Rollback with {} failed ({:#}), replacing the link", remote_id, e);
                let state = link.state;
                self.registry.close(remote_id).await;

                let (link, _) = self.registry.get_or_create(remote_id, Role::Responder).await?;
                link.state = state;
                link.transport.attach_local_tracks().await?;

                let after = self.config.connecting_timeout();
                self.arm_deadline(remote_id, DeadlineKind::Connecting, after);
            }
        }
        Ok(())
    }

    fn set_state(&mut self, remote_id: &ParticipantId, state: LinkState) {
        let Some(link) = self.registry.get_mut(remote_id) else {
            return;
        };
        if link.state == state {
            return;
        }

        info!("Link to {}: {} -> {}", remote_id, link.state, state);
        link.state = state;
        self.emit(SessionEvent::LinkStateChanged {
            remote_id: remote_id.clone(),
            state,
        });

        if state == LinkState::Failed {
            self.emit(SessionEvent::PeerUnreachable {
                remote_id: remote_id.clone(),
            });
        }
    }

    fn arm_deadline(&mut self, remote_id: &ParticipantId, kind: DeadlineKind, after: Duration) {
        let Some(link) = self.registry.get_mut(remote_id) else {
            return;
        };
        link.deadline_generation += 1;

        let deadline = Deadline {
            remote_id: remote_id.clone(),
            link_id: link.link_id,
            generation: link.deadline_generation,
            kind,
        };
        let tx = self.deadline_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(deadline);
        });
    }

    async fn close_link(&mut self, remote_id: &ParticipantId) {
        if self.registry.close(remote_id).await.is_some() {
            self.emit(SessionEvent::LinkStateChanged {
                remote_id: remote_id.clone(),
                state: LinkState::Closed,
            });
        }
        self.roster.remove(remote_id);
    }

    async fn fail_link(&mut self, remote_id: &ParticipantId) {
        self.set_state(remote_id, LinkState::Failed);
        self.close_link(remote_id).await;
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events_tx.send(event);
    }
}

/// Control handle for a session running on its own task.
///
/// Event subscriptions close once the session task has finished.
pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
    events: broadcast::Receiver<SessionEvent>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.resubscribe()
    }

    pub async fn call(&self, remote_id: ParticipantId) -> Result<(), ClientError> {
        self.command_tx
            .send(SessionCommand::Call(remote_id))
            .await
            .map_err(|_| ClientError::Transport(anyhow!("session has stopped")))
    }

    /// Leaves the room and waits for the session task to finish.
    pub async fn leave(self) -> Result<(), ClientError> {
        let _ = self.command_tx.send(SessionCommand::Leave).await;
        self.task
            .await
            .map_err(|e| ClientError::Transport(anyhow!("session task failed: {}", e)))
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
