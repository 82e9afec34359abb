//! WebSocket handler for the signaling namespace
//!
//! Each connection becomes one namespace session:
//! - `connection-success` is sent first, carrying the session id
//! - `sdp` and `candidate` frames are rebroadcast, unmodified, to every other session
//! - frames with an invalid envelope are answered with an `error` event to the sender only
//! - a ping is sent every `heartbeat_secs`

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::relay::Namespace;
use crate::signaling::{ForwardedFrame, RelayFrame, ServerEvent, SessionId};
use crate::state::AppState;

/// WebSocket upgrade handler
///
/// Mounted at `/{ws_path}/:namespace`; any namespace other than the
/// configured one is rejected before the upgrade.
pub async fn relay_ws_handler(
    Path(namespace): Path<String>,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    if namespace != state.namespace.name() {
        return Err(AppError::NotFound(format!("namespace '{}'", namespace)));
    }
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state)))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (session_id, mut outbound) = state.namespace.connect();
    let mut shutdown_rx = state.shutdown_signal();

    let period = Duration::from_secs(state.config.heartbeat_secs);
    let mut heartbeat_interval = interval_at(Instant::now() + period, period);

    info!("Socket connected: {}", session_id);

    loop {
        tokio::select! {
            // Receive frame from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = relay_frame(&state.namespace, &session_id, &text) {
                            warn!("Rejected frame from {}: {}", session_id, e);
                            let reply = ServerEvent::error(format!("Invalid message: {}", e));
                            if !send_frame(&mut sender, &reply.into()).await {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!("Rejected binary frame from {}", session_id);
                        let reply = ServerEvent::error("Binary frames are not supported");
                        if !send_frame(&mut sender, &reply.into()).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // WebSocket automatically handles ping/pong
                        debug!("Received ping from {}", session_id);
                    }
                    Some(Ok(Message::Pong(_))) => {
                        debug!("Received pong from {}", session_id);
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket receive error on {}: {}", session_id, e);
                        break;
                    }
                }
            }

            // Deliver events queued for this session
            frame = outbound.recv() => {
                match frame {
                    Some(frame) => {
                        if !send_frame(&mut sender, &frame).await {
                            warn!(
                                "Failed to deliver {} to {}, disconnecting",
                                frame.name(),
                                session_id
                            );
                            break;
                        }
                    }
                    None => break,
                }
            }

            // Heartbeat
            _ = heartbeat_interval.tick() => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    warn!("Failed to send ping to {}, disconnecting", session_id);
                    break;
                }
            }

            _ = shutdown_rx.recv() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    state.namespace.disconnect(&session_id);
    info!("Socket disconnected: {}", session_id);
}

/// Check one client frame's envelope and rebroadcast it as received
///
/// Returns the event name and the number of sessions it reached.
fn relay_frame(
    namespace: &Namespace,
    from: &SessionId,
    text: &str,
) -> std::result::Result<(&'static str, usize), serde_json::Error> {
    let frame = ForwardedFrame::parse(text)?;
    let name = frame.kind().name();
    let delivered = namespace.broadcast(from, frame);
    debug!("{} from {} relayed to {} session(s)", name, from, delivered);
    Ok((name, delivered))
}

/// Serialize and send; returns false once the socket is unusable
async fn send_frame<S>(sender: &mut S, frame: &RelayFrame) -> bool
where
    S: futures::Sink<Message> + Unpin,
{
    match frame.to_json() {
        Ok(json) => sender.send(Message::Text(json)).await.is_ok(),
        Err(e) => {
            warn!("Failed to serialize {}: {}", frame.name(), e);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_relay_frame_forwards_to_peer() {
        let ns = Namespace::new("test");
        let (a, _a_rx) = ns.connect();
        let (_b, mut b_rx) = ns.connect();
        b_rx.recv().await.unwrap();

        let text = r#"{"event":"candidate","data":{"candidate":"c1"}}"#;
        assert_eq!(relay_frame(&ns, &a, text).unwrap(), ("candidate", 1));
        assert_eq!(b_rx.recv().await.unwrap().to_json().unwrap(), text);
    }

    #[tokio::test]
    async fn test_relay_frame_keeps_nulls_and_unknown_fields() {
        let ns = Namespace::new("test");
        let (a, _a_rx) = ns.connect();
        let (_b, mut b_rx) = ns.connect();
        b_rx.recv().await.unwrap();

        let text = r#"{"event":"candidate","data":{"candidate":"c1","sdpMid":null,"sdpMLineIndex":null,"extra":1}}"#;
        relay_frame(&ns, &a, text).unwrap();
        assert_eq!(b_rx.recv().await.unwrap().to_json().unwrap(), text);

        let text = r#"{"event":"candidate","data":{"candidate":"c2","sdpMLineIndex":70000}}"#;
        assert_eq!(relay_frame(&ns, &a, text).unwrap(), ("candidate", 1));
        assert_eq!(b_rx.recv().await.unwrap().to_json().unwrap(), text);
    }

    #[test]
    fn test_relay_frame_rejects_malformed() {
        let ns = Namespace::new("test");
        let (a, _a_rx) = ns.connect();
        let (_b, _b_rx) = ns.connect();

        assert!(relay_frame(&ns, &a, "not json").is_err());
        assert!(relay_frame(&ns, &a, r#"{"event":"sdp","data":{}}"#).is_err());
    }

    #[test]
    fn test_relay_frame_alone_is_noop() {
        let ns = Namespace::new("test");
        let (a, _a_rx) = ns.connect();

        let text = r#"{"event":"candidate","data":{"candidate":"c1"}}"#;
        assert_eq!(relay_frame(&ns, &a, text).unwrap(), ("candidate", 0));
    }
}
