use crate::error::RelayError;
use crate::registry::RoomRegistry;
use crate::relay::relay::SignalingRelay;
use crate::relay::relay_command::{RelayCommand, RelayStats};
use crate::relay::session::SessionId;
use crate::signaling::SessionDirectory;
use meshroom_core::{IceServerConfig, ParticipantId, RoomId, SignalMessage};
use tokio::sync::{mpsc, oneshot};

const COMMAND_BUFFER: usize = 1024;

/// Cloneable entry point into a running [`SignalingRelay`].
#[derive(Clone)]
pub struct RelayHandle {
    command_tx: mpsc::Sender<RelayCommand>,
    directory: SessionDirectory,
}

impl RelayHandle {
    /// Spawns the relay actor on the current runtime with an empty registry.
    pub fn spawn(ice_servers: Vec<IceServerConfig>) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let directory = SessionDirectory::new();

        let relay = SignalingRelay::new(
            RoomRegistry::new(),
            directory.clone(),
            ice_servers,
            command_rx,
        );
        tokio::spawn(relay.run());

        Self {
            command_tx,
            directory,
        }
    }

    /// Opens a new session. Everything the relay sends to it arrives on the
    /// returned receiver, starting with `ice-config`.
    pub async fn connect(
        &self,
    ) -> Result<(SessionId, mpsc::UnboundedReceiver<SignalMessage>), RelayError> {
        let session_id = SessionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        self.directory.register(session_id, tx);

        if self
            .command_tx
            .send(RelayCommand::Connect { session_id })
            .await
            .is_err()
        {
            self.directory.unregister(&session_id);
            return Err(RelayError::Closed);
        }

        Ok((session_id, rx))
    }

    pub async fn send(&self, session_id: SessionId, message: SignalMessage) -> Result<(), RelayError> {
        self.command_tx
            .send(RelayCommand::Inbound {
                session_id,
                message,
            })
            .await
            .map_err(|_| RelayError::Closed)
    }

    pub async fn disconnect(&self, session_id: SessionId) -> Result<(), RelayError> {
        self.command_tx
            .send(RelayCommand::Disconnect { session_id })
            .await
            .map_err(|_| RelayError::Closed)
    }

    pub async fn members_of(&self, room_id: RoomId) -> Result<Vec<ParticipantId>, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(RelayCommand::MembersOf { room_id, reply })
            .await
            .map_err(|_| RelayError::Closed)?;
        rx.await.map_err(|_| RelayError::Closed)
    }

    pub async fn stats(&self) -> Result<RelayStats, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(RelayCommand::Stats { reply })
            .await
            .map_err(|_| RelayError::Closed)?;
        rx.await.map_err(|_| RelayError::Closed)
    }
}
