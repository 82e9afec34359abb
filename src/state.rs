use std::sync::Arc;
use tokio::sync::broadcast;

use crate::config::RelayConfig;
use crate::relay::Namespace;

/// Relay state shared across handlers
pub struct AppState {
    /// Relay configuration
    pub config: RelayConfig,
    /// The signaling namespace every peer joins
    pub namespace: Arc<Namespace>,
    /// Shutdown signal sender
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: RelayConfig, shutdown_tx: broadcast::Sender<()>) -> Arc<Self> {
        let namespace = Arc::new(Namespace::new(config.namespace.clone()));
        Arc::new(Self {
            config,
            namespace,
            shutdown_tx,
        })
    }

    /// Subscribe to shutdown signal
    pub fn shutdown_signal(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }
}
