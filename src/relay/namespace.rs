//! Namespace-scoped session registry and fan-out
//!
//! A [`Namespace`] holds one outbound queue per live connection. The queues
//! are unbounded so a broadcast never blocks the sender on a slow peer, and
//! each queue preserves the order in which a given sender broadcast.

use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::signaling::{ForwardedFrame, RelayFrame, ServerEvent, SessionId};

/// Outbound queue of one session
pub type SessionSender = mpsc::UnboundedSender<RelayFrame>;
/// Receiving end handed to the transport that owns the connection
pub type SessionReceiver = mpsc::UnboundedReceiver<RelayFrame>;

/// Broadcast scope shared by all sessions connected under one name
///
/// The namespace keeps no history. A session only sees events broadcast
/// after its own `connect` returned.
///
/// # Example
///
/// ```no_run
/// use peer_relay::relay::Namespace;
/// use peer_relay::signaling::ForwardedFrame;
///
/// let ns = Namespace::new("webRTCPeers");
/// let (alice, _alice_rx) = ns.connect();
/// let (_bob, _bob_rx) = ns.connect();
///
/// let text = r#"{"event":"candidate","data":{"candidate":"c1"}}"#;
/// let frame = ForwardedFrame::parse(text).unwrap();
/// let delivered = ns.broadcast(&alice, frame);
/// assert_eq!(delivered, 1);
/// ```
pub struct Namespace {
    name: String,
    sessions: RwLock<HashMap<SessionId, SessionSender>>,
}

impl Namespace {
    /// Create an empty namespace
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a new session
    ///
    /// The returned receiver already holds the session's single
    /// `connection-success` acknowledgment. No other session is notified.
    pub fn connect(&self) -> (SessionId, SessionReceiver) {
        let id = SessionId::generate();
        let (tx, rx) = mpsc::unbounded_channel();
        // rx is alive, send cannot fail
        let _ = tx.send(ServerEvent::connection_success(id.clone()).into());

        let count = {
            let mut sessions = self.sessions.write();
            sessions.insert(id.clone(), tx);
            sessions.len()
        };
        info!(
            "Session {} joined namespace '{}' ({} connected)",
            id, self.name, count
        );

        (id, rx)
    }

    /// Remove a session; returns whether it was registered
    pub fn disconnect(&self, id: &SessionId) -> bool {
        let (removed, count) = {
            let mut sessions = self.sessions.write();
            let removed = sessions.remove(id).is_some();
            (removed, sessions.len())
        };
        if removed {
            info!(
                "Session {} left namespace '{}' ({} connected)",
                id, self.name, count
            );
        }
        removed
    }

    /// Deliver `frame` to every session except `from`
    ///
    /// Returns the number of recipients whose queue accepted the frame.
    /// Recipients that are already gone are skipped without error.
    pub fn broadcast(&self, from: &SessionId, frame: ForwardedFrame) -> usize {
        let sessions = self.sessions.read();
        let mut delivered = 0;

        for (id, tx) in sessions.iter() {
            if id == from {
                continue;
            }
            if tx.send(RelayFrame::Forwarded(frame.clone())).is_ok() {
                delivered += 1;
            } else {
                debug!("Session {} queue closed, skipping", id);
            }
        }

        delivered
    }

    /// Number of registered sessions
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().contains_key(id)
    }
}
