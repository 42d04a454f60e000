use async_trait::async_trait;
use meshroom_core::SignalMessage;

/// Outbound half of the relay connection, as seen by a session.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Sends `message` to the relay. While disconnected the message is
    /// dropped and logged; nothing is queued.
    async fn send_signal(&self, message: SignalMessage);
}
