use crate::relay::SessionId;
use dashmap::DashMap;
use meshroom_core::SignalMessage;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Outbound half of every live session.
///
/// Transport tasks register a sender when they connect and drain the
/// matching receiver into their socket; the relay pushes into it.
#[derive(Clone, Default)]
pub struct SessionDirectory {
    sessions: Arc<DashMap<SessionId, mpsc::UnboundedSender<SignalMessage>>>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session_id: SessionId, tx: mpsc::UnboundedSender<SignalMessage>) {
        self.sessions.insert(session_id, tx);
    }

    /// Dropping the sender ends the session's writer task.
    pub fn unregister(&self, session_id: &SessionId) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    pub fn contains(&self, session_id: &SessionId) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Fire-and-forget delivery. Returns whether the message was queued.
    pub fn send(&self, session_id: &SessionId, msg: SignalMessage) -> bool {
        let Some(session) = self.sessions.get(session_id) else {
            warn!(
                "Attempted to send '{}' to disconnected session {}",
                msg.kind(),
                session_id
            );
            return false;
        };

        debug!("-> {} '{}'", session_id, msg.kind());
        if session.send(msg).is_err() {
            warn!("Outbound channel of session {} is closed", session_id);
            return false;
        }
        true
    }
}
