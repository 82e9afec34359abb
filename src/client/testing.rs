//! In-memory negotiator and relay used by the client tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::media::LocalStream;
use super::peer::{OfferOptions, PeerNegotiator};
use super::transport::RelayClient;
use crate::error::{AppError, Result};
use crate::signaling::{ClientEvent, IceCandidate, SdpKind, SessionDescription};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerCall {
    AddLocalStream(usize),
    CreateOffer(OfferOptions),
    CreateAnswer(OfferOptions),
    SetLocal(SdpKind),
    SetRemote(SdpKind),
}

/// Records every negotiation call; candidates are kept apart
pub struct FakePeer {
    name: String,
    calls: Mutex<Vec<PeerCall>>,
    remote_candidates: Mutex<Vec<IceCandidate>>,
    candidates_tx: mpsc::UnboundedSender<IceCandidate>,
    candidates_rx: Mutex<Option<mpsc::UnboundedReceiver<IceCandidate>>>,
    fail_remote: bool,
}

impl FakePeer {
    pub fn new(name: &str) -> Self {
        let (candidates_tx, candidates_rx) = mpsc::unbounded_channel();
        Self {
            name: name.to_string(),
            calls: Mutex::new(Vec::new()),
            remote_candidates: Mutex::new(Vec::new()),
            candidates_tx,
            candidates_rx: Mutex::new(Some(candidates_rx)),
            fail_remote: false,
        }
    }

    /// Reject every remote description, like a malformed SDP would
    pub fn fail_remote(mut self) -> Self {
        self.fail_remote = true;
        self
    }

    /// Handle standing in for the ICE agent's gathering callback
    pub fn candidate_sender(&self) -> mpsc::UnboundedSender<IceCandidate> {
        self.candidates_tx.clone()
    }

    pub fn calls(&self) -> Vec<PeerCall> {
        self.calls.lock().clone()
    }

    pub fn remote_candidates(&self) -> Vec<String> {
        self.remote_candidates
            .lock()
            .iter()
            .map(|c| c.candidate.clone())
            .collect()
    }

    fn record(&self, call: PeerCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl PeerNegotiator for FakePeer {
    async fn add_local_stream(&self, stream: &LocalStream) -> Result<()> {
        self.record(PeerCall::AddLocalStream(stream.tracks.len()));
        Ok(())
    }

    async fn create_offer(&self, options: OfferOptions) -> Result<SessionDescription> {
        self.record(PeerCall::CreateOffer(options));
        Ok(SessionDescription::offer(format!("offer-from-{}", self.name)))
    }

    async fn create_answer(&self, options: OfferOptions) -> Result<SessionDescription> {
        self.record(PeerCall::CreateAnswer(options));
        Ok(SessionDescription::answer(format!("answer-from-{}", self.name)))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.record(PeerCall::SetLocal(desc.kind));
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        if self.fail_remote {
            return Err(AppError::WebRtcError(
                "Failed to set remote description".to_string(),
            ));
        }
        self.record(PeerCall::SetRemote(desc.kind));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.remote_candidates.lock().push(candidate);
        Ok(())
    }

    fn take_local_candidates(&self) -> Option<mpsc::UnboundedReceiver<IceCandidate>> {
        self.candidates_rx.lock().take()
    }
}

/// Relay client capturing sent events
#[derive(Default)]
pub struct FakeRelay {
    sent: Arc<Mutex<Vec<ClientEvent>>>,
}

impl FakeRelay {
    pub fn sent(&self) -> Vec<ClientEvent> {
        self.sent.lock().clone()
    }

    /// Shared view of the send log, usable after the relay moved away
    pub fn handle(&self) -> Arc<Mutex<Vec<ClientEvent>>> {
        self.sent.clone()
    }
}

#[async_trait]
impl RelayClient for FakeRelay {
    async fn send(&self, event: ClientEvent) -> Result<()> {
        self.sent.lock().push(event);
        Ok(())
    }
}
