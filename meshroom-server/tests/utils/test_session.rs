use anyhow::{Context, Result};
use meshroom_core::{ParticipantId, RoomId, SignalMessage};
use meshroom_server::{RelayHandle, SessionId};
use serde_json::json;
use tokio::sync::mpsc;

/// Timeout for a single expected relay message (ms).
pub const RECV_TIMEOUT_MS: u64 = 1000;

/// How long to wait before concluding nothing was delivered (ms).
pub const SILENCE_MS: u64 = 150;

/// A participant talking to the relay through its command channel, with no
/// socket in between.
pub struct TestSession {
    pub session_id: SessionId,
    pub participant_id: ParticipantId,
    pub room_id: RoomId,
    relay: RelayHandle,
    rx: mpsc::UnboundedReceiver<SignalMessage>,
}

impl TestSession {
    /// Connect and consume the initial `ice-config`.
    pub async fn connect(relay: &RelayHandle, participant: &str, room: &str) -> Result<Self> {
        let (session_id, rx) = relay.connect().await?;
        let mut session = Self {
            session_id,
            participant_id: ParticipantId::from(participant),
            room_id: RoomId::from(room),
            relay: relay.clone(),
            rx,
        };

        match session.recv().await? {
            SignalMessage::IceConfig { .. } => Ok(session),
            other => anyhow::bail!("Expected ice-config first, got {:?}", other.kind()),
        }
    }

    pub async fn send(&self, message: SignalMessage) -> Result<()> {
        self.relay.send(self.session_id, message).await?;
        Ok(())
    }

    pub async fn join(&self) -> Result<()> {
        self.send(SignalMessage::JoinRoom {
            room_id: self.room_id.clone(),
            participant_id: self.participant_id.clone(),
        })
        .await
    }

    /// Join and return the roster the relay answers with.
    pub async fn join_and_roster(&mut self) -> Result<Vec<ParticipantId>> {
        self.join().await?;
        self.expect_roster().await
    }

    pub async fn leave(&self) -> Result<()> {
        self.send(SignalMessage::LeaveRoom {
            room_id: self.room_id.clone(),
            participant_id: self.participant_id.clone(),
        })
        .await
    }

    pub async fn offer(&self, to: &str, sdp: &str) -> Result<()> {
        self.send(SignalMessage::Offer {
            room_id: self.room_id.clone(),
            sender_id: self.participant_id.clone(),
            receiver_id: ParticipantId::from(to),
            sdp: sdp.to_owned(),
        })
        .await
    }

    pub async fn answer(&self, to: &str, sdp: &str) -> Result<()> {
        self.send(SignalMessage::Answer {
            room_id: self.room_id.clone(),
            sender_id: self.participant_id.clone(),
            receiver_id: ParticipantId::from(to),
            sdp: sdp.to_owned(),
        })
        .await
    }

    pub async fn ice_candidate(&self, to: &str, candidate: &str) -> Result<()> {
        self.send(SignalMessage::IceCandidate {
            room_id: self.room_id.clone(),
            sender_id: self.participant_id.clone(),
            receiver_id: ParticipantId::from(to),
            candidate: json!({ "candidate": candidate, "sdpMid": "0", "sdpMLineIndex": 0 }),
        })
        .await
    }

    /// Simulates the transport vanishing without a `leave-room`.
    pub async fn drop_transport(self) -> Result<()> {
        self.relay.disconnect(self.session_id).await?;
        Ok(())
    }

    pub async fn recv(&mut self) -> Result<SignalMessage> {
        let timeout = std::time::Duration::from_millis(RECV_TIMEOUT_MS);
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .context("Timeout waiting for relay message")?
            .context("Session channel closed")
    }

    pub async fn expect_roster(&mut self) -> Result<Vec<ParticipantId>> {
        match self.recv().await? {
            SignalMessage::Roster { participants, .. } => Ok(participants),
            other => anyhow::bail!("Expected roster, got {:?}", other),
        }
    }

    pub async fn expect_peer_joined(&mut self) -> Result<ParticipantId> {
        match self.recv().await? {
            SignalMessage::PeerJoined { participant_id, .. } => Ok(participant_id),
            other => anyhow::bail!("Expected peer-joined, got {:?}", other),
        }
    }

    pub async fn expect_peer_left(&mut self) -> Result<ParticipantId> {
        match self.recv().await? {
            SignalMessage::PeerLeft { participant_id, .. } => Ok(participant_id),
            other => anyhow::bail!("Expected peer-left, got {:?}", other),
        }
    }

    /// Asserts that nothing arrives within [`SILENCE_MS`].
    pub async fn expect_silence(&mut self) -> Result<()> {
        let window = std::time::Duration::from_millis(SILENCE_MS);
        match tokio::time::timeout(window, self.rx.recv()).await {
            Err(_) => Ok(()),
            Ok(Some(msg)) => anyhow::bail!("Expected silence, got {:?}", msg),
            Ok(None) => anyhow::bail!("Expected silence, but the channel closed"),
        }
    }

    /// True once the relay has dropped this session's outbound channel.
    pub async fn is_closed(&mut self) -> bool {
        let timeout = std::time::Duration::from_millis(RECV_TIMEOUT_MS);
        loop {
            match tokio::time::timeout(timeout, self.rx.recv()).await {
                Ok(None) => return true,
                Ok(Some(_)) => continue,
                Err(_) => return false,
            }
        }
    }
}

pub fn ids(names: &[&str]) -> Vec<ParticipantId> {
    names.iter().map(|n| ParticipantId::from(*n)).collect()
}
