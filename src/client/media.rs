//! Local media acquisition

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

use crate::error::{AppError, Result};

/// Requested media kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// One local track and its kind
#[derive(Clone)]
pub struct LocalTrack {
    pub kind: RTPCodecType,
    pub track: Arc<dyn TrackLocal + Send + Sync>,
}

/// Tracks acquired for one call, sharing a stream id
#[derive(Clone)]
pub struct LocalStream {
    pub stream_id: String,
    pub tracks: Vec<LocalTrack>,
}

impl LocalStream {
    pub fn has_kind(&self, kind: RTPCodecType) -> bool {
        self.tracks.iter().any(|t| t.kind == kind)
    }
}

/// Source of local camera/microphone tracks
#[async_trait]
pub trait MediaSource: Send {
    async fn acquire(&mut self, constraints: MediaConstraints) -> Result<LocalStream>;
}

/// Sample-fed Opus/VP8 tracks for the headless peer
///
/// With `enabled = false` acquisition fails the way a missing or denied
/// capture device does.
pub struct LocalMedia {
    enabled: bool,
    stream_id: String,
}

impl LocalMedia {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            stream_id: format!("peer-relay-{}", uuid::Uuid::new_v4()),
        }
    }
}

#[async_trait]
impl MediaSource for LocalMedia {
    async fn acquire(&mut self, constraints: MediaConstraints) -> Result<LocalStream> {
        if !self.enabled {
            return Err(AppError::Media(
                "no capture device available".to_string(),
            ));
        }

        let mut tracks = Vec::new();
        if constraints.audio {
            let track = TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_OPUS.to_owned(),
                    clock_rate: 48000,
                    channels: 2,
                    ..Default::default()
                },
                "audio0".to_owned(),
                self.stream_id.clone(),
            );
            tracks.push(LocalTrack {
                kind: RTPCodecType::Audio,
                track: Arc::new(track),
            });
        }
        if constraints.video {
            let track = TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_VP8.to_owned(),
                    clock_rate: 90000,
                    ..Default::default()
                },
                "video0".to_owned(),
                self.stream_id.clone(),
            );
            tracks.push(LocalTrack {
                kind: RTPCodecType::Video,
                track: Arc::new(track),
            });
        }

        info!(
            "Local media acquired: stream {} ({} track(s))",
            self.stream_id,
            tracks.len()
        );
        Ok(LocalStream {
            stream_id: self.stream_id.clone(),
            tracks,
        })
    }
}
