//! Server startup and lifecycle

use crate::{routes, AppState, GatewayConfig};
use docgate_core::Gateway;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Run the gateway server
pub async fn run_server(config: GatewayConfig) -> anyhow::Result<()> {
    run_server_with_shutdown(config, std::future::pending()).await
}

/// Run server with graceful shutdown
pub async fn run_server_with_shutdown(
    config: GatewayConfig,
    shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(config.clone()).await?);
    let sweeper = spawn_cursor_sweeper(&state);
    let app = routes::create_router(state);

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;

    info!("docgate listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    info!("Gateway shutdown complete");

    Ok(())
}

/// Periodically evict idle cursors when a cursor TTL is configured
pub fn spawn_cursor_sweeper(state: &AppState) -> Option<JoinHandle<()>> {
    let ttl = state.config.cursor_ttl_secs?;
    let period = Duration::from_secs(state.config.cursor_sweep_secs.max(1));
    let gateway: Arc<Gateway> = Arc::clone(&state.gateway);

    info!(ttl_secs = ttl, sweep_secs = period.as_secs(), "Idle cursor sweeping enabled");
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let evicted = gateway.sweep_cursors();
            if evicted > 0 {
                debug!(evicted, open = gateway.cursors().len(), "Cursor sweep");
            }
        }
    }))
}
