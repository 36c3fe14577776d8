pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::orchestrator::ReplayOrchestrator;

pub use routes::router;

/// Serves the worker and operator API until Ctrl-C.
pub async fn serve(addr: SocketAddr, orchestrator: Arc<ReplayOrchestrator>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!("HTTP server listening on http://{}", addr);
    axum::serve(listener, router(orchestrator))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .with_context(|| format!("serve {addr}"))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown requested");
}
