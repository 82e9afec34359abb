//! Signaling relay
//!
//! The relay is a dumb forwarder: it tags each connection with a session id
//! and fans `sdp` and `candidate` events out to every other session of the
//! namespace. It never inspects SDP or candidate contents and keeps no
//! history.

pub mod namespace;

pub use namespace::{Namespace, SessionReceiver, SessionSender};
