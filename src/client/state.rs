//! Call lifecycle states and their transitions
//!
//! Everything here is pure; [`super::CallSession`] applies the side effects
//! (descriptions, relay sends) and then commits the transition.

use serde::Serialize;
use std::fmt;

use crate::error::{AppError, Result};
use crate::signaling::{SdpKind, SessionId};

/// Which side placed the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallRole {
    Caller,
    Callee,
}

/// Local call state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "role", rename_all = "snake_case")]
pub enum CallState {
    /// No remote activity yet; the local peer may place a call
    AwaitingAction,
    /// A remote offer arrived and must be answered
    AnswerPending,
    /// Offer or answer was sent. Terminal.
    Connected(CallRole),
}

/// User-triggered action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalAction {
    Call,
    Answer,
}

impl fmt::Display for LocalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalAction::Call => write!(f, "call"),
            LocalAction::Answer => write!(f, "answer"),
        }
    }
}

impl std::str::FromStr for LocalAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" => Ok(LocalAction::Call),
            "answer" => Ok(LocalAction::Answer),
            other => Err(AppError::BadRequest(format!("unknown action '{}'", other))),
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallState::AwaitingAction => write!(f, "awaiting action"),
            CallState::AnswerPending => write!(f, "answer pending"),
            CallState::Connected(CallRole::Caller) => write!(f, "connected as caller"),
            CallState::Connected(CallRole::Callee) => write!(f, "connected as callee"),
        }
    }
}

impl CallState {
    /// The action the UI should offer, if any
    pub fn available_action(&self) -> Option<LocalAction> {
        match self {
            CallState::AwaitingAction => Some(LocalAction::Call),
            CallState::AnswerPending => Some(LocalAction::Answer),
            CallState::Connected(_) => None,
        }
    }

    /// Reject `action` unless it is the one currently offered
    pub fn check(&self, action: LocalAction) -> Result<()> {
        if self.available_action() == Some(action) {
            Ok(())
        } else {
            Err(AppError::InvalidAction {
                action: action.to_string(),
                state: self.to_string(),
            })
        }
    }
}

/// Status line shown to the user (happy path only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallStatus {
    MakeACall,
    Calling,
    IncomingCall,
    CallEstablished,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::MakeACall => "Make a call",
            CallStatus::Calling => "Calling...",
            CallStatus::IncomingCall => "Incoming call...",
            CallStatus::CallEstablished => "Call established",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable view of a call session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSnapshot {
    pub state: CallState,
    pub status: CallStatus,
    /// Id assigned by the relay, once acknowledged
    pub session_id: Option<SessionId>,
}

impl Default for CallSnapshot {
    fn default() -> Self {
        Self {
            state: CallState::AwaitingAction,
            status: CallStatus::MakeACall,
            session_id: None,
        }
    }
}

impl CallSnapshot {
    /// Transition after a remote description of `kind` was applied
    ///
    /// The callee path wins over an unplaced local call, and `Connected`
    /// never changes again.
    pub fn after_remote(&self, kind: SdpKind) -> Self {
        let (state, status) = match (self.state, kind) {
            (CallState::AwaitingAction | CallState::AnswerPending, SdpKind::Offer) => {
                (CallState::AnswerPending, CallStatus::IncomingCall)
            }
            (CallState::Connected(role), SdpKind::Offer) => {
                (CallState::Connected(role), self.status)
            }
            (state, SdpKind::Answer) => (state, CallStatus::CallEstablished),
        };
        Self {
            state,
            status,
            session_id: self.session_id.clone(),
        }
    }

    /// Transition after `action` completed (description set and sent)
    pub fn after_local(&self, action: LocalAction) -> Result<Self> {
        self.state.check(action)?;
        let (state, status) = match action {
            LocalAction::Call => (CallState::Connected(CallRole::Caller), CallStatus::Calling),
            LocalAction::Answer => (
                CallState::Connected(CallRole::Callee),
                CallStatus::CallEstablished,
            ),
        };
        Ok(Self {
            state,
            status,
            session_id: self.session_id.clone(),
        })
    }
}
