//! Relay connection used by a call session

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::signaling::{ClientEvent, ServerEvent};

/// Outbound half of a relay connection
///
/// Inbound events are delivered separately as an `mpsc` receiver so the
/// session loop can own both without borrowing conflicts.
#[async_trait]
pub trait RelayClient: Send + Sync {
    async fn send(&self, event: ClientEvent) -> Result<()>;
}

/// WebSocket relay connection (tokio-tungstenite)
pub struct WsRelayClient {
    outgoing: mpsc::UnboundedSender<Message>,
}

impl WsRelayClient {
    /// Connect to a relay namespace URL such as
    /// `ws://localhost:5000/webrtc/webRTCPeers`
    pub async fn connect(url: &str) -> Result<(Self, mpsc::UnboundedReceiver<ServerEvent>)> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| AppError::Transport(format!("Failed to connect to {}: {}", url, e)))?;
        info!("Connected to relay at {}", url);

        let (mut sink, mut stream) = ws.split();
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(msg) = outgoing_rx.recv().await {
                if let Err(e) = sink.send(msg).await {
                    warn!("Relay send failed: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => match ServerEvent::from_json(&text) {
                        Ok(event) => {
                            if inbound_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("Undecodable relay frame: {}", e),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Relay receive error: {}", e);
                        break;
                    }
                }
            }
            info!("Relay connection closed");
        });

        Ok((
            Self {
                outgoing: outgoing_tx,
            },
            inbound_rx,
        ))
    }
}

#[async_trait]
impl RelayClient for WsRelayClient {
    async fn send(&self, event: ClientEvent) -> Result<()> {
        let json = event.to_json()?;
        debug!("Sending {} to relay", event.name());
        self.outgoing
            .send(Message::Text(json))
            .map_err(|_| AppError::Transport("relay connection closed".to_string()))
    }
}
