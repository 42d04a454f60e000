use crate::error::ClientError;
use crate::signaling::signaling_output::SignalingOutput;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use meshroom_core::SignalMessage;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// WebSocket connection to a signaling relay.
#[derive(Clone)]
pub struct RelayClient {
    tx: mpsc::UnboundedSender<Message>,
    connected: Arc<AtomicBool>,
}

impl RelayClient {
    /// Connects to `url` (e.g. `ws://127.0.0.1:3000/ws`). Everything the relay
    /// sends arrives on the returned receiver, which closes with the socket.
    pub async fn connect(
        url: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SignalMessage>), ClientError> {
        info!("Connecting to relay at {}", url);
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| ClientError::Relay(e.to_string()))?;
        info!("Connected to relay");

        let (write, read) = ws_stream.split();
        let (tx, rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));

        tokio::spawn(Self::sender_task(write, rx, connected.clone()));
        tokio::spawn(Self::receiver_task(read, inbound_tx, connected.clone()));

        Ok((Self { tx, connected }, inbound_rx))
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Asks the sender task to close the socket.
    pub fn close(&self) {
        let _ = self.tx.send(Message::Close(None));
    }

    async fn sender_task(
        mut write: futures::stream::SplitSink<WsStream, Message>,
        mut rx: mpsc::UnboundedReceiver<Message>,
        connected: Arc<AtomicBool>,
    ) {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if let Err(e) = write.send(msg).await {
                error!("Failed to send to relay: {}", e);
                break;
            }
            if closing {
                break;
            }
        }

        connected.store(false, Ordering::SeqCst);
        debug!("Relay sender task terminated");
    }

    async fn receiver_task(
        mut read: futures::stream::SplitStream<WsStream>,
        inbound_tx: mpsc::UnboundedSender<SignalMessage>,
        connected: Arc<AtomicBool>,
    ) {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<SignalMessage>(text.as_str()) {
                        Ok(message) => {
                            if inbound_tx.send(message).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Ignoring malformed relay frame: {}", e),
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("Relay closed the connection");
                    break;
                }
                Err(e) => {
                    error!("Relay connection error: {}", e);
                    break;
                }
                _ => {}
            }
        }

        connected.store(false, Ordering::SeqCst);
        debug!("Relay receiver task terminated");
    }
}

#[async_trait]
impl SignalingOutput for RelayClient {
    async fn send_signal(&self, message: SignalMessage) {
        if !self.is_connected() {
            warn!("Not connected to relay, dropping '{}'", message.kind());
            return;
        }

        let json = match serde_json::to_string(&message) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize '{}': {}", message.kind(), e);
                return;
            }
        };

        if self.tx.send(Message::Text(json.into())).is_err() {
            warn!("Relay connection gone, dropping '{}'", message.kind());
        }
    }
}
