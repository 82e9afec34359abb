//! Signaling client
//!
//! Runs inside each peer. Tracks whether the peer may place a call, must
//! answer one, or is connected, and drives its peer connection through
//! offer/answer creation using a relay connection injected at construction.
//!
//! ```text
//!   AwaitingAction --call--> Connected(Caller)
//!        |
//!   remote offer
//!        v
//!   AnswerPending --answer--> Connected(Callee)
//! ```

pub mod media;
pub mod peer;
pub mod session;
pub mod state;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use media::{LocalMedia, LocalStream, LocalTrack, MediaConstraints, MediaSource};
pub use peer::{OfferOptions, PeerNegotiator, WebRtcPeer};
pub use session::CallSession;
pub use state::{CallRole, CallSnapshot, CallState, CallStatus, LocalAction};
pub use transport::{RelayClient, WsRelayClient};

#[cfg(test)]
mod tests {
    use super::testing::FakePeer;
    use super::*;
    use crate::config::RelayConfig;
    use crate::state::AppState;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::{broadcast, mpsc, watch};

    struct Peer {
        snapshots: watch::Receiver<CallSnapshot>,
        commands: mpsc::UnboundedSender<LocalAction>,
        candidates: mpsc::UnboundedSender<crate::signaling::IceCandidate>,
    }

    async fn start_relay() -> String {
        let (shutdown_tx, _) = broadcast::channel(1);
        let state = AppState::new(RelayConfig::default(), shutdown_tx);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(crate::web::serve(listener, state));
        format!("ws://{}/webrtc/webRTCPeers", addr)
    }

    async fn join(url: &str, name: &str) -> Peer {
        let (relay, inbound) = WsRelayClient::connect(url).await.unwrap();
        let peer = FakePeer::new(name);
        let candidates = peer.candidate_sender();
        let session = CallSession::start(&mut LocalMedia::new(true), peer, relay)
            .await
            .unwrap();
        let mut snapshots = session.subscribe();
        let (commands, commands_rx) = mpsc::unbounded_channel();
        tokio::spawn(session.run(inbound, commands_rx));

        snapshots
            .wait_for(|s| s.session_id.is_some())
            .await
            .unwrap();
        Peer {
            snapshots,
            commands,
            candidates,
        }
    }

    async fn wait_status(peer: &mut Peer, status: CallStatus) -> CallSnapshot {
        tokio::time::timeout(
            Duration::from_secs(5),
            peer.snapshots.wait_for(|s| s.status == status),
        )
        .await
        .expect("timed out waiting for status")
        .unwrap()
        .clone()
    }

    #[tokio::test]
    async fn test_call_is_established_through_relay() {
        let url = start_relay().await;
        let mut alice = join(&url, "alice").await;
        let mut bob = join(&url, "bob").await;

        alice.commands.send(LocalAction::Call).unwrap();
        assert_eq!(
            wait_status(&mut alice, CallStatus::Calling).await.state,
            CallState::Connected(CallRole::Caller)
        );

        let incoming = wait_status(&mut bob, CallStatus::IncomingCall).await;
        assert_eq!(incoming.state, CallState::AnswerPending);

        bob.commands.send(LocalAction::Answer).unwrap();
        let bob_done = wait_status(&mut bob, CallStatus::CallEstablished).await;
        assert_eq!(bob_done.state, CallState::Connected(CallRole::Callee));

        let alice_done = wait_status(&mut alice, CallStatus::CallEstablished).await;
        assert_eq!(alice_done.state, CallState::Connected(CallRole::Caller));
    }

    #[tokio::test]
    async fn test_each_peer_learns_a_distinct_session_id() {
        let url = start_relay().await;
        let alice = join(&url, "alice").await;
        let bob = join(&url, "bob").await;

        let a = alice.snapshots.borrow().session_id.clone();
        let b = bob.snapshots.borrow().session_id.clone();
        assert!(a.is_some());
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_gathered_candidates_cross_the_relay() {
        let url = start_relay().await;
        let alice = join(&url, "alice").await;

        // observe bob's side directly to see arrival order
        let (_bob_relay, mut bob_inbound) = WsRelayClient::connect(&url).await.unwrap();
        bob_inbound.recv().await.unwrap();

        for c in ["c1", "c2", "c3"] {
            alice
                .candidates
                .send(crate::signaling::IceCandidate::new(c))
                .unwrap();
        }

        for c in ["c1", "c2", "c3"] {
            let event = tokio::time::timeout(Duration::from_secs(5), bob_inbound.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(
                event,
                crate::signaling::ServerEvent::Candidate(crate::signaling::IceCandidate::new(c))
            );
        }
    }
}
