//! Call session: the offer/answer state machine
//!
//! A [`CallSession`] exclusively owns its peer negotiator and relay client.
//! All mutation happens from one task, either through the direct methods
//! (`call`, `answer`, `handle_event`, `send_local_candidate`) or through
//! [`CallSession::run`], which multiplexes the same inputs.

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::media::{MediaConstraints, MediaSource};
use super::peer::{OfferOptions, PeerNegotiator};
use super::state::{CallSnapshot, CallState, CallStatus, LocalAction};
use super::transport::RelayClient;
use crate::error::{AppError, Result};
use crate::signaling::{
    ClientEvent, IceCandidate, SdpMessage, ServerEvent, SessionDescription, SessionId,
};

pub struct CallSession<R, P> {
    relay: R,
    peer: P,
    snapshot: CallSnapshot,
    snapshot_tx: watch::Sender<CallSnapshot>,
    local_candidates: Option<mpsc::UnboundedReceiver<IceCandidate>>,
}

impl<R: RelayClient, P: PeerNegotiator> CallSession<R, P> {
    /// Acquire local media, attach it to `peer` and build the session
    ///
    /// Media failure is fatal; there is no retry.
    pub async fn start<M: MediaSource>(media: &mut M, peer: P, relay: R) -> Result<Self> {
        let stream = media.acquire(MediaConstraints::default()).await?;
        peer.add_local_stream(&stream).await?;

        let local_candidates = peer.take_local_candidates();
        let snapshot = CallSnapshot::default();
        let (snapshot_tx, _) = watch::channel(snapshot.clone());

        Ok(Self {
            relay,
            peer,
            snapshot,
            snapshot_tx,
            local_candidates,
        })
    }

    pub fn state(&self) -> CallState {
        self.snapshot.state
    }

    pub fn status(&self) -> CallStatus {
        self.snapshot.status
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.snapshot.session_id.as_ref()
    }

    /// The action the UI should currently offer
    pub fn available_action(&self) -> Option<LocalAction> {
        self.snapshot.state.available_action()
    }

    /// Watch state, status and session id changes
    pub fn subscribe(&self) -> watch::Receiver<CallSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn negotiator(&self) -> &P {
        &self.peer
    }

    pub fn relay(&self) -> &R {
        &self.relay
    }

    /// Place a call: create, apply and send a local offer
    pub async fn call(&mut self) -> Result<()> {
        self.perform(LocalAction::Call).await
    }

    /// Answer the pending remote offer
    pub async fn answer(&mut self) -> Result<()> {
        self.perform(LocalAction::Answer).await
    }

    pub async fn perform(&mut self, action: LocalAction) -> Result<()> {
        self.snapshot.state.check(action)?;

        let options = OfferOptions::default();
        let desc = match action {
            LocalAction::Call => self.peer.create_offer(options).await?,
            LocalAction::Answer => self.peer.create_answer(options).await?,
        };
        self.send_local_description(desc).await?;

        let next = self.snapshot.after_local(action)?;
        self.commit(next);
        Ok(())
    }

    async fn send_local_description(&mut self, desc: SessionDescription) -> Result<()> {
        self.peer.set_local_description(desc.clone()).await?;

        let socket_id = self
            .snapshot
            .session_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_default();
        info!("Sending local {} as {:?}", desc.kind, socket_id);
        self.relay
            .send(ClientEvent::Sdp(SdpMessage::new(socket_id, desc)))
            .await
    }

    /// Apply one event received from the relay
    ///
    /// Negotiator failures are returned unrecovered.
    pub async fn handle_event(&mut self, event: ServerEvent) -> Result<()> {
        match event {
            ServerEvent::ConnectionSuccess(ack) => {
                info!("Relay assigned session id {}", ack.success);
                let mut next = self.snapshot.clone();
                next.session_id = Some(ack.success);
                self.commit(next);
            }
            ServerEvent::Sdp(msg) => {
                let desc = msg.payload.sdp;
                let kind = desc.kind;
                info!("Remote {} from {:?}", kind, msg.socket_id);
                // applied regardless of local state
                self.peer.set_remote_description(desc).await?;
                let next = self.snapshot.after_remote(kind);
                self.commit(next);
            }
            ServerEvent::Candidate(candidate) => {
                debug!("Remote ICE candidate: {}", candidate.candidate);
                self.peer.add_ice_candidate(candidate).await?;
            }
            ServerEvent::Error(e) => {
                warn!("Relay rejected a message: {}", e.message);
            }
        }
        Ok(())
    }

    /// Forward one locally gathered candidate upstream
    pub async fn send_local_candidate(&mut self, candidate: IceCandidate) -> Result<()> {
        debug!("Sending local ICE candidate: {}", candidate.candidate);
        self.relay.send(ClientEvent::Candidate(candidate)).await
    }

    /// Drive the session until the relay stream ends
    pub async fn run(
        mut self,
        mut inbound: mpsc::UnboundedReceiver<ServerEvent>,
        mut commands: mpsc::UnboundedReceiver<LocalAction>,
    ) -> Result<()> {
        let mut candidates = self.local_candidates.take();

        loop {
            tokio::select! {
                event = inbound.recv() => {
                    match event {
                        Some(event) => self.handle_event(event).await?,
                        None => break,
                    }
                }
                Some(candidate) = next_candidate(&mut candidates) => {
                    self.send_local_candidate(candidate).await?;
                }
                Some(action) = commands.recv() => {
                    match self.perform(action).await {
                        Err(e @ AppError::InvalidAction { .. }) => warn!("{}", e),
                        other => other?,
                    }
                }
            }
        }

        info!("Relay stream ended, leaving call ({})", self.snapshot.status);
        Ok(())
    }

    fn commit(&mut self, next: CallSnapshot) {
        if next.state != self.snapshot.state {
            info!("Call state: {} -> {}", self.snapshot.state, next.state);
        }
        if next.status != self.snapshot.status {
            info!("Status: {}", next.status);
        }
        self.snapshot = next;
        self.snapshot_tx.send_replace(self.snapshot.clone());
    }
}

async fn next_candidate(
    rx: &mut Option<mpsc::UnboundedReceiver<IceCandidate>>,
) -> Option<IceCandidate> {
    match rx {
        Some(rx) => rx.recv().await,
        None => None,
    }
}
