use crate::error::RelayError;
use crate::registry::RoomRegistry;
use crate::relay::relay_command::{RelayCommand, RelayStats};
use crate::relay::session::{SessionId, SessionRecord};
use crate::signaling::SessionDirectory;
use meshroom_core::{IceServerConfig, ParticipantId, RoomId, SignalMessage};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// The signaling relay actor.
///
/// Owns room membership and the session ↔ participant associations. All
/// mutations happen on this task, one command at a time, so two joins to
/// the same room can never interleave.
pub struct SignalingRelay {
    registry: RoomRegistry,
    sessions: HashMap<SessionId, Option<SessionRecord>>,
    addresses: HashMap<(RoomId, ParticipantId), SessionId>,
    directory: SessionDirectory,
    ice_servers: Vec<IceServerConfig>,
    command_rx: mpsc::Receiver<RelayCommand>,
}

impl SignalingRelay {
    pub fn new(
        registry: RoomRegistry,
        directory: SessionDirectory,
        ice_servers: Vec<IceServerConfig>,
        command_rx: mpsc::Receiver<RelayCommand>,
    ) -> Self {
        Self {
            registry,
            sessions: HashMap::new(),
            addresses: HashMap::new(),
            directory,
            ice_servers,
            command_rx,
        }
    }

    pub async fn run(mut self) {
        info!("Relay event loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd);
        }

        info!("Command channel closed. Relay event loop finished");
    }

    fn handle_command(&mut self, cmd: RelayCommand) {
        match cmd {
            RelayCommand::Connect { session_id } => {
                info!("Session {} connected", session_id);
                self.sessions.insert(session_id, None);
                self.directory.send(
                    &session_id,
                    SignalMessage::IceConfig {
                        ice_servers: self.ice_servers.clone(),
                    },
                );
            }

            RelayCommand::Inbound {
                session_id,
                message,
            } => {
                if !self.sessions.contains_key(&session_id) {
                    debug!("Ignoring '{}' from unknown session {}", message.kind(), session_id);
                    return;
                }
                if let Err(e) = self.handle_message(session_id, message) {
                    self.fault(session_id, e);
                }
            }

            RelayCommand::Disconnect { session_id } => {
                self.disconnect(session_id);
            }

            RelayCommand::MembersOf { room_id, reply } => {
                let _ = reply.send(self.registry.members_of(&room_id));
            }

            RelayCommand::Stats { reply } => {
                let _ = reply.send(RelayStats {
                    rooms: self.registry.room_count(),
                    sessions: self.sessions.len(),
                    joined_sessions: self.sessions.values().filter(|r| r.is_some()).count(),
                });
            }
        }
    }

    fn handle_message(
        &mut self,
        session_id: SessionId,
        message: SignalMessage,
    ) -> Result<(), RelayError> {
        let kind = message.kind();
        debug!("<- {} '{}'", session_id, kind);

        if kind.is_relay_only() {
            return Err(RelayError::RelayOnlyKind(kind));
        }

        match message {
            SignalMessage::JoinRoom {
                room_id,
                participant_id,
            } => {
                self.join(session_id, SessionRecord::new(room_id, participant_id));
                Ok(())
            }

            SignalMessage::LeaveRoom {
                room_id,
                participant_id,
            } => {
                let requested = SessionRecord::new(room_id, participant_id);
                let owns = matches!(
                    self.sessions.get(&session_id),
                    Some(Some(current)) if *current == requested
                );
                if owns {
                    self.leave(session_id, &requested);
                    self.sessions.insert(session_id, None);
                } else {
                    debug!(
                        "Session {} asked to leave '{}' as {} without that association",
                        session_id, requested.room_id, requested.participant_id
                    );
                }
                Ok(())
            }

            directed => self.forward(session_id, directed),
        }
    }

    fn join(&mut self, session_id: SessionId, record: SessionRecord) {
        if let Some(Some(previous)) = self.sessions.get(&session_id).cloned() {
            if previous != record {
                info!(
                    "Session {} re-joins without leaving '{}' first",
                    session_id, previous.room_id
                );
                self.leave(session_id, &previous);
            }
        }

        let SessionRecord {
            room_id,
            participant_id,
        } = &record;

        let address = (room_id.clone(), participant_id.clone());
        let replaced = self
            .addresses
            .get(&address)
            .copied()
            .filter(|other| *other != session_id);

        if let Some(other) = replaced {
            warn!(
                "{} in '{}' is taken over by session {} (was {})",
                participant_id, room_id, session_id, other
            );
            // The old session keeps its socket but no longer speaks for the id.
            if let Some(association) = self.sessions.get_mut(&other) {
                *association = None;
            }
            for member in self.registry.members_of(room_id) {
                if member != *participant_id {
                    self.deliver_to(
                        room_id,
                        &member,
                        SignalMessage::PeerLeft {
                            room_id: room_id.clone(),
                            participant_id: participant_id.clone(),
                        },
                    );
                }
            }
        }

        let newly_added = !self.registry.contains(room_id, participant_id);
        let existing = self.registry.join(room_id, participant_id);
        info!(
            "{} joined '{}' via session {} ({} already there)",
            participant_id,
            room_id,
            session_id,
            existing.len()
        );

        self.addresses.insert(address, session_id);
        self.sessions.insert(session_id, Some(record.clone()));

        self.directory.send(
            &session_id,
            SignalMessage::Roster {
                room_id: room_id.clone(),
                participants: existing.clone(),
            },
        );

        if newly_added || replaced.is_some() {
            for member in &existing {
                self.deliver_to(
                    room_id,
                    member,
                    SignalMessage::PeerJoined {
                        room_id: room_id.clone(),
                        participant_id: participant_id.clone(),
                    },
                );
            }
        }
    }

    /// Drops the membership behind `record` if this session still owns it
    /// and tells the remaining members. The session table is left to the caller.
    fn leave(&mut self, session_id: SessionId, record: &SessionRecord) {
        let address = (record.room_id.clone(), record.participant_id.clone());
        if self.addresses.get(&address) != Some(&session_id) {
            debug!(
                "Session {} no longer owns {} in '{}'",
                session_id, record.participant_id, record.room_id
            );
            return;
        }
        self.addresses.remove(&address);

        if !self.registry.leave(&record.room_id, &record.participant_id) {
            return;
        }
        info!("{} left '{}'", record.participant_id, record.room_id);

        for member in self.registry.members_of(&record.room_id) {
            self.deliver_to(
                &record.room_id,
                &member,
                SignalMessage::PeerLeft {
                    room_id: record.room_id.clone(),
                    participant_id: record.participant_id.clone(),
                },
            );
        }
    }

    fn forward(&self, session_id: SessionId, message: SignalMessage) -> Result<(), RelayError> {
        let Some(Some(record)) = self.sessions.get(&session_id) else {
            return Err(RelayError::NotJoined(session_id));
        };

        let Some((sender_id, receiver_id)) = message.route() else {
            return Err(RelayError::RelayOnlyKind(message.kind()));
        };
        if *sender_id != record.participant_id {
            return Err(RelayError::SenderMismatch {
                claimed: sender_id.clone(),
                actual: record.participant_id.clone(),
            });
        }

        let room_id = message.room_id().cloned().unwrap_or_else(|| record.room_id.clone());
        if room_id != record.room_id {
            return Err(RelayError::RoomMismatch {
                claimed: room_id,
                actual: record.room_id.clone(),
            });
        }

        let receiver_id = receiver_id.clone();
        if !self.deliver_to(&room_id, &receiver_id, message) {
            debug!(
                "Dropping message for {} in '{}': no such session",
                receiver_id, room_id
            );
        }
        Ok(())
    }

    fn deliver_to(
        &self,
        room_id: &RoomId,
        participant_id: &ParticipantId,
        message: SignalMessage,
    ) -> bool {
        let address = (room_id.clone(), participant_id.clone());
        match self.addresses.get(&address) {
            Some(session_id) => self.directory.send(session_id, message),
            None => false,
        }
    }

    fn disconnect(&mut self, session_id: SessionId) {
        let Some(association) = self.sessions.remove(&session_id) else {
            return;
        };

        if let Some(record) = association {
            info!(
                "Session {} closed without leaving '{}', cleaning up {}",
                session_id, record.room_id, record.participant_id
            );
            self.leave(session_id, &record);
        }

        self.directory.unregister(&session_id);
        info!("Session {} disconnected", session_id);
    }

    fn fault(&mut self, session_id: SessionId, error: RelayError) {
        warn!("Session {} faulted: {}", session_id, error);
        self.directory.send(
            &session_id,
            SignalMessage::Error {
                code: error.code().to_owned(),
                message: error.to_string(),
            },
        );
        self.disconnect(session_id);
    }
}
