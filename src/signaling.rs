//! Signaling wire protocol
//!
//! Every WebSocket text frame carries one JSON envelope of the form
//! `{"event": "<name>", "data": <payload>}`. The relay checks only the
//! envelope ([`ForwardedFrame`]) and forwards `data` as the exact JSON text
//! it received. Peers decode the typed [`ClientEvent`] / [`ServerEvent`].

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::fmt;

/// Relay-assigned identity of one live connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random session id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SDP description kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

impl fmt::Display for SdpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdpKind::Offer => write!(f, "offer"),
            SdpKind::Answer => write!(f, "answer"),
        }
    }
}

/// Session description as exchanged by browsers (`RTCSessionDescriptionInit`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    /// Opaque SDP body
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdpPayload {
    pub sdp: SessionDescription,
}

/// `sdp` event body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdpMessage {
    /// Session id of the sender, as the sender reported it
    #[serde(rename = "socketID")]
    pub socket_id: String,
    pub payload: SdpPayload,
}

impl SdpMessage {
    pub fn new(socket_id: impl Into<String>, sdp: SessionDescription) -> Self {
        Self {
            socket_id: socket_id.into(),
            payload: SdpPayload { sdp },
        }
    }

    pub fn description(&self) -> &SessionDescription {
        &self.payload.sdp
    }
}

/// ICE candidate (`RTCIceCandidateInit`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// Candidate string
    pub candidate: String,
    /// SDP mid (media ID)
    #[serde(
        rename = "sdpMid",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mid: Option<String>,
    /// SDP mline index
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_mline_index: Option<u16>,
    /// Username fragment
    #[serde(
        rename = "usernameFragment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_mline_index: None,
            username_fragment: None,
        }
    }

    pub fn with_mid(mut self, mid: impl Into<String>, index: u16) -> Self {
        self.sdp_mid = Some(mid.into());
        self.sdp_mline_index = Some(index);
        self
    }
}

/// `connection-success` event body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionAck {
    pub success: SessionId,
}

/// `error` event body, sent only to the session whose frame was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayError {
    pub message: String,
}

/// Client-to-server event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    Sdp(SdpMessage),
    Candidate(IceCandidate),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Sdp(_) => "sdp",
            ClientEvent::Candidate(_) => "candidate",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Server-to-client event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    ConnectionSuccess(ConnectionAck),
    Sdp(SdpMessage),
    Candidate(IceCandidate),
    Error(RelayError),
}

impl ServerEvent {
    pub fn connection_success(id: SessionId) -> Self {
        ServerEvent::ConnectionSuccess(ConnectionAck { success: id })
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error(RelayError {
            message: message.into(),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ConnectionSuccess(_) => "connection-success",
            ServerEvent::Sdp(_) => "sdp",
            ServerEvent::Candidate(_) => "candidate",
            ServerEvent::Error(_) => "error",
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Event names a client may send through the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ForwardedKind {
    Sdp,
    Candidate,
}

impl ForwardedKind {
    pub fn name(&self) -> &'static str {
        match self {
            ForwardedKind::Sdp => "sdp",
            ForwardedKind::Candidate => "candidate",
        }
    }
}

#[derive(Deserialize)]
struct SdpEnvelope {
    payload: SdpTypeOnly,
}

#[derive(Deserialize)]
struct SdpTypeOnly {
    sdp: SdpKindOnly,
}

#[derive(Deserialize)]
struct SdpKindOnly {
    #[serde(rename = "type")]
    kind: SdpKind,
}

/// Client frame as the relay forwards it
///
/// `data` keeps the raw JSON text of the original frame: unknown fields,
/// explicit `null`s and key order survive the trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardedFrame {
    event: ForwardedKind,
    data: Box<RawValue>,
}

impl ForwardedFrame {
    /// Check the envelope of one client frame
    ///
    /// Accepts `sdp` whose description `type` is `offer` or `answer`, and
    /// `candidate` whose data is a JSON object. Nothing else is inspected.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let frame: ForwardedFrame = serde_json::from_str(text)?;
        match frame.event {
            ForwardedKind::Sdp => {
                frame.sdp_kind()?;
            }
            ForwardedKind::Candidate => {
                if !frame.data.get().trim_start().starts_with('{') {
                    return Err(serde_json::Error::custom(
                        "candidate data must be a JSON object",
                    ));
                }
            }
        }
        Ok(frame)
    }

    pub fn kind(&self) -> ForwardedKind {
        self.event
    }

    /// Raw JSON text of `data`
    pub fn data(&self) -> &str {
        self.data.get()
    }

    /// Description type of an `sdp` frame
    pub fn sdp_kind(&self) -> Result<SdpKind, serde_json::Error> {
        let envelope: SdpEnvelope = serde_json::from_str(self.data.get())?;
        Ok(envelope.payload.sdp.kind)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl PartialEq for ForwardedFrame {
    fn eq(&self, other: &Self) -> bool {
        self.event == other.event && self.data.get() == other.data.get()
    }
}

/// One frame queued by the relay for a session
#[derive(Debug, Clone, PartialEq)]
pub enum RelayFrame {
    /// Generated by the relay itself
    Event(ServerEvent),
    /// Another session's frame, passed through
    Forwarded(ForwardedFrame),
}

impl RelayFrame {
    pub fn name(&self) -> &'static str {
        match self {
            RelayFrame::Event(event) => event.name(),
            RelayFrame::Forwarded(frame) => frame.kind().name(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            RelayFrame::Event(event) => event.to_json(),
            RelayFrame::Forwarded(frame) => frame.to_json(),
        }
    }
}

impl From<ServerEvent> for RelayFrame {
    fn from(event: ServerEvent) -> Self {
        RelayFrame::Event(event)
    }
}

impl From<ForwardedFrame> for RelayFrame {
    fn from(frame: ForwardedFrame) -> Self {
        RelayFrame::Forwarded(frame)
    }
}
