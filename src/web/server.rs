use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use super::routes::create_router;
use crate::state::AppState;

/// Serve the relay on an already bound listener until shutdown is signalled
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    let mut shutdown_rx = state.shutdown_signal();
    let app = create_router(state.clone());

    info!(
        "Relay listening on ws://{}{}",
        listener.local_addr()?,
        state.config.namespace_path()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
}
