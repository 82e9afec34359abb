//! Peer connection seam and its webrtc-rs implementation

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::track::track_remote::TrackRemote;

use super::media::LocalStream;
use crate::config::IceConfig;
use crate::error::{AppError, Result};
use crate::signaling::{IceCandidate, SdpKind, SessionDescription};

/// Media a created description must be able to receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferOptions {
    pub receive_audio: bool,
    pub receive_video: bool,
}

impl Default for OfferOptions {
    fn default() -> Self {
        Self {
            receive_audio: true,
            receive_video: true,
        }
    }
}

/// Offer/answer negotiation capability owned by one call session
#[async_trait]
pub trait PeerNegotiator: Send + Sync {
    /// Attach acquired local tracks
    async fn add_local_stream(&self, stream: &LocalStream) -> Result<()>;

    async fn create_offer(&self, options: OfferOptions) -> Result<SessionDescription>;

    async fn create_answer(&self, options: OfferOptions) -> Result<SessionDescription>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    /// Apply a remote candidate
    ///
    /// Valid in any state: a candidate that arrives before the remote
    /// description is held and applied once the description is set.
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Stream of locally gathered candidates; yields `Some` only once
    fn take_local_candidates(&self) -> Option<mpsc::UnboundedReceiver<IceCandidate>>;
}

/// webrtc-rs peer connection wrapper
pub struct WebRtcPeer {
    pc: Arc<RTCPeerConnection>,
    /// Remote candidates received before any remote description
    pending_candidates: Mutex<Vec<RTCIceCandidateInit>>,
    candidates_rx: Mutex<Option<mpsc::UnboundedReceiver<IceCandidate>>>,
    has_audio: AtomicBool,
    has_video: AtomicBool,
}

impl WebRtcPeer {
    /// Create a new peer connection
    pub async fn new(config: &IceConfig) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| AppError::WebRtcError(format!("Failed to register codecs: {}", e)))?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine).map_err(|e| {
            AppError::WebRtcError(format!("Failed to register interceptors: {}", e))
        })?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers = config
            .stun_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let pc = api.new_peer_connection(rtc_config).await.map_err(|e| {
            AppError::WebRtcError(format!("Failed to create peer connection: {}", e))
        })?;

        let (candidates_tx, candidates_rx) = mpsc::unbounded_channel();

        let peer = Self {
            pc: Arc::new(pc),
            pending_candidates: Mutex::new(Vec::new()),
            candidates_rx: Mutex::new(Some(candidates_rx)),
            has_audio: AtomicBool::new(false),
            has_video: AtomicBool::new(false),
        };
        peer.setup_event_handlers(candidates_tx);

        Ok(peer)
    }

    /// Set up peer connection event handlers
    fn setup_event_handlers(&self, candidates_tx: mpsc::UnboundedSender<IceCandidate>) {
        self.pc
            .on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
                Box::pin(async move {
                    info!("Peer connection state: {}", s);
                })
            }));

        // Push-as-you-go: every gathered candidate is forwarded immediately
        self.pc
            .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                let candidates_tx = candidates_tx.clone();

                Box::pin(async move {
                    let Some(c) = candidate else {
                        debug!("ICE gathering complete");
                        return;
                    };
                    match c.to_json() {
                        Ok(init) => {
                            debug!("Local ICE candidate: {}", init.candidate);
                            let _ = candidates_tx.send(IceCandidate {
                                candidate: init.candidate,
                                sdp_mid: init.sdp_mid,
                                sdp_mline_index: init.sdp_mline_index,
                                username_fragment: init.username_fragment,
                            });
                        }
                        Err(e) => debug!("Failed to serialize local candidate: {}", e),
                    }
                })
            }));

        self.pc.on_track(Box::new(
            |track: Arc<TrackRemote>,
             _receiver: Arc<RTCRtpReceiver>,
             _transceiver: Arc<RTCRtpTransceiver>| {
                Box::pin(async move {
                    info!("Remote {} track received", track.kind());
                })
            },
        ));
    }

    /// Close the connection
    pub async fn close(&self) -> Result<()> {
        self.pc.close().await.map_err(|e| {
            AppError::WebRtcError(format!("Failed to close peer connection: {}", e))
        })
    }

    async fn apply_candidate(&self, init: RTCIceCandidateInit) -> Result<()> {
        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| AppError::WebRtcError(format!("Failed to add ICE candidate: {}", e)))
    }

    #[cfg(test)]
    fn pending_candidate_count(&self) -> usize {
        self.pending_candidates.lock().len()
    }

    /// Add a receive-only transceiver for kinds that have no local track
    async fn ensure_receivers(&self, options: OfferOptions) -> Result<()> {
        let wanted = [
            (options.receive_audio, RTPCodecType::Audio, &self.has_audio),
            (options.receive_video, RTPCodecType::Video, &self.has_video),
        ];
        for (receive, kind, present) in wanted {
            if !receive || present.swap(true, Ordering::SeqCst) {
                continue;
            }
            self.pc
                .add_transceiver_from_kind(
                    kind,
                    Some(RTCRtpTransceiverInit {
                        direction: RTCRtpTransceiverDirection::Recvonly,
                        send_encodings: vec![],
                    }),
                )
                .await
                .map_err(|e| {
                    AppError::WebRtcError(format!("Failed to add {} transceiver: {}", kind, e))
                })?;
        }
        Ok(())
    }
}

fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let parsed = match desc.kind {
        SdpKind::Offer => RTCSessionDescription::offer(desc.sdp),
        SdpKind::Answer => RTCSessionDescription::answer(desc.sdp),
    };
    parsed.map_err(|e| AppError::WebRtcError(format!("Invalid session description: {}", e)))
}

fn from_rtc(desc: RTCSessionDescription) -> Result<SessionDescription> {
    match desc.sdp_type {
        RTCSdpType::Offer => Ok(SessionDescription::offer(desc.sdp)),
        RTCSdpType::Answer => Ok(SessionDescription::answer(desc.sdp)),
        other => Err(AppError::WebRtcError(format!(
            "Unexpected description type: {}",
            other
        ))),
    }
}

#[async_trait]
impl PeerNegotiator for WebRtcPeer {
    async fn add_local_stream(&self, stream: &LocalStream) -> Result<()> {
        for local in &stream.tracks {
            self.pc
                .add_track(local.track.clone())
                .await
                .map_err(|e| AppError::WebRtcError(format!("Failed to add track: {}", e)))?;
            match local.kind {
                RTPCodecType::Audio => self.has_audio.store(true, Ordering::SeqCst),
                RTPCodecType::Video => self.has_video.store(true, Ordering::SeqCst),
                _ => {}
            }
        }
        info!("Local stream {} attached", stream.stream_id);
        Ok(())
    }

    async fn create_offer(&self, options: OfferOptions) -> Result<SessionDescription> {
        self.ensure_receivers(options).await?;
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| AppError::WebRtcError(format!("Failed to create offer: {}", e)))?;
        from_rtc(offer)
    }

    async fn create_answer(&self, options: OfferOptions) -> Result<SessionDescription> {
        // transceivers come from the remote offer
        debug!("Creating answer ({:?})", options);
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| AppError::WebRtcError(format!("Failed to create answer: {}", e)))?;
        from_rtc(answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.pc
            .set_local_description(to_rtc(desc)?)
            .await
            .map_err(|e| AppError::WebRtcError(format!("Failed to set local description: {}", e)))
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.pc
            .set_remote_description(to_rtc(desc)?)
            .await
            .map_err(|e| {
                AppError::WebRtcError(format!("Failed to set remote description: {}", e))
            })?;

        let pending = std::mem::take(&mut *self.pending_candidates.lock());
        if !pending.is_empty() {
            debug!("Applying {} buffered remote candidate(s)", pending.len());
        }
        for init in pending {
            self.apply_candidate(init).await?;
        }
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_mline_index,
            username_fragment: candidate.username_fragment,
        };

        if self.pc.remote_description().await.is_none() {
            debug!("Buffering remote candidate until a remote description is set");
            self.pending_candidates.lock().push(init);
            return Ok(());
        }
        self.apply_candidate(init).await
    }

    fn take_local_candidates(&self) -> Option<mpsc::UnboundedReceiver<IceCandidate>> {
        self.candidates_rx.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::media::{LocalMedia, MediaConstraints, MediaSource};

    #[tokio::test]
    async fn test_offer_carries_audio_and_video() {
        let peer = WebRtcPeer::new(&IceConfig::default()).await.unwrap();

        let offer = peer.create_offer(OfferOptions::default()).await.unwrap();
        assert_eq!(offer.kind, SdpKind::Offer);
        assert!(offer.sdp.contains("m=audio"));
        assert!(offer.sdp.contains("m=video"));
        peer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_local_tracks_make_offer_sendrecv() {
        let peer = WebRtcPeer::new(&IceConfig::default()).await.unwrap();
        let stream = LocalMedia::new(true)
            .acquire(MediaConstraints::default())
            .await
            .unwrap();
        peer.add_local_stream(&stream).await.unwrap();

        let offer = peer.create_offer(OfferOptions::default()).await.unwrap();
        assert!(offer.sdp.contains("a=sendrecv"));
        assert!(!offer.sdp.contains("a=recvonly"));
        peer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_two_peers_negotiate() {
        let caller = WebRtcPeer::new(&IceConfig::default()).await.unwrap();
        let callee = WebRtcPeer::new(&IceConfig::default()).await.unwrap();

        let offer = caller.create_offer(OfferOptions::default()).await.unwrap();
        caller.set_local_description(offer.clone()).await.unwrap();
        callee.set_remote_description(offer).await.unwrap();

        let answer = callee.create_answer(OfferOptions::default()).await.unwrap();
        assert_eq!(answer.kind, SdpKind::Answer);
        callee.set_local_description(answer.clone()).await.unwrap();
        caller.set_remote_description(answer).await.unwrap();

        caller.close().await.unwrap();
        callee.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_candidate_stream_taken_once() {
        let peer = WebRtcPeer::new(&IceConfig::default()).await.unwrap();
        assert!(peer.take_local_candidates().is_some());
        assert!(peer.take_local_candidates().is_none());
        peer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_garbage_remote_description_fails() {
        let peer = WebRtcPeer::new(&IceConfig::default()).await.unwrap();
        let err = peer
            .set_remote_description(SessionDescription::offer("not sdp"))
            .await;
        assert!(matches!(err, Err(AppError::WebRtcError(_))));
        peer.close().await.unwrap();
    }

    fn host_candidate() -> IceCandidate {
        IceCandidate::new("candidate:1 1 udp 2122260223 192.168.1.2 54321 typ host")
            .with_mid("0", 0)
    }

    #[tokio::test]
    async fn test_early_candidate_is_held_until_remote_offer() {
        let caller = WebRtcPeer::new(&IceConfig::default()).await.unwrap();
        let callee = WebRtcPeer::new(&IceConfig::default()).await.unwrap();

        callee.add_ice_candidate(host_candidate()).await.unwrap();
        assert_eq!(callee.pending_candidate_count(), 1);

        let offer = caller.create_offer(OfferOptions::default()).await.unwrap();
        caller.set_local_description(offer.clone()).await.unwrap();
        callee.set_remote_description(offer).await.unwrap();
        assert_eq!(callee.pending_candidate_count(), 0);

        caller.close().await.unwrap();
        callee.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_candidate_is_tolerated() {
        let caller = WebRtcPeer::new(&IceConfig::default()).await.unwrap();
        let callee = WebRtcPeer::new(&IceConfig::default()).await.unwrap();

        let offer = caller.create_offer(OfferOptions::default()).await.unwrap();
        caller.set_local_description(offer.clone()).await.unwrap();
        callee.set_remote_description(offer).await.unwrap();

        assert!(callee.add_ice_candidate(host_candidate()).await.is_ok());
        assert!(callee.add_ice_candidate(host_candidate()).await.is_ok());
        assert_eq!(callee.pending_candidate_count(), 0);

        caller.close().await.unwrap();
        callee.close().await.unwrap();
    }
}
