use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

use crate::error::{AppError, Result};

/// Default listening port when `PORT` is not set
pub const DEFAULT_PORT: u16 = 5000;
/// Default WebSocket mount path
pub const DEFAULT_WS_PATH: &str = "webrtc";
/// Default (and only) signaling namespace
pub const DEFAULT_NAMESPACE: &str = "webRTCPeers";

/// Relay server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Bind address
    pub bind_address: String,
    /// HTTP port
    pub port: u16,
    /// First path segment of the WebSocket endpoint
    pub ws_path: String,
    /// Namespace name (second path segment)
    pub namespace: String,
    /// Interval between WebSocket pings
    pub heartbeat_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            ws_path: DEFAULT_WS_PATH.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            heartbeat_secs: 30,
        }
    }
}

impl RelayConfig {
    /// Check path segments and timings
    pub fn validate(&self) -> Result<()> {
        for (name, segment) in [("ws_path", &self.ws_path), ("namespace", &self.namespace)] {
            if segment.is_empty() || segment.contains('/') {
                return Err(AppError::Config(format!(
                    "{} must be a single non-empty path segment, got '{}'",
                    name, segment
                )));
            }
        }
        if self.heartbeat_secs == 0 {
            return Err(AppError::Config(
                "heartbeat_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the listening socket address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid bind address: {}", self.bind_address)))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Axum route pattern of the WebSocket endpoint
    pub fn ws_route(&self) -> String {
        format!("/{}/:namespace", self.ws_path)
    }

    /// Path a client connects to
    pub fn namespace_path(&self) -> String {
        format!("/{}/{}", self.ws_path, self.namespace)
    }
}

/// ICE server configuration for the headless peer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IceConfig {
    /// STUN server URLs
    ///
    /// Empty by default: host candidates are enough on a local network.
    pub stun_servers: Vec<String>,
}

/// Headless peer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Relay namespace URL
    pub relay_url: String,
    /// ICE servers
    pub ice: IceConfig,
    /// Place the call as soon as the relay acknowledges the connection
    pub place_call: bool,
    /// Answer incoming offers without waiting for input
    pub auto_answer: bool,
    /// Acquire local audio/video tracks at startup
    pub media_enabled: bool,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            relay_url: format!(
                "ws://localhost:{}/{}/{}",
                DEFAULT_PORT, DEFAULT_WS_PATH, DEFAULT_NAMESPACE
            ),
            ice: IceConfig::default(),
            place_call: false,
            auto_answer: false,
            media_enabled: true,
        }
    }
}

impl PeerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.relay_url.starts_with("ws://") || self.relay_url.starts_with("wss://")) {
            return Err(AppError::Config(format!(
                "relay_url must be a ws:// or wss:// URL, got '{}'",
                self.relay_url
            )));
        }
        if self.place_call && self.auto_answer {
            return Err(AppError::Config(
                "place_call and auto_answer are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }
}
