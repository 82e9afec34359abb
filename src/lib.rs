//! peer-relay - WebRTC signaling relay
//!
//! This crate provides a namespace-scoped relay that forwards SDP offers,
//! answers and ICE candidates between browser peers, plus a headless
//! signaling client that runs the offer/answer state machine against the
//! same relay.

pub mod client;
pub mod config;
pub mod error;
pub mod relay;
pub mod signaling;
pub mod state;
pub mod web;

pub use error::{AppError, Result};
