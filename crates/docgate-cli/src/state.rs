//! Application state

use crate::config::GatewayConfig;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use docgate_core::Gateway;
use docgate_store::MemoryConnector;
use std::sync::Arc;
use tracing::{info, warn};

/// Application state shared across handlers
pub struct AppState {
    /// Gateway configuration
    pub config: GatewayConfig,
    /// Dispatcher with its connection registry and cursor table
    pub gateway: Arc<Gateway>,
    /// Embedded store servers the gateway connects to
    pub connector: MemoryConnector,
    /// Headers stamped on every response
    pub response_headers: HeaderMap,
}

impl AppState {
    /// Create the state and pre-connect the configured servers
    pub async fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let response_headers = build_headers(&config.extra_headers())?;

        // Every configured server is served by the embedded engine
        let connector = MemoryConnector::new();
        for server in &config.servers {
            connector.add_server(server);
        }
        info!(servers = ?config.server_addresses(), "Using embedded in-memory store (data will not persist)");

        let gateway = Arc::new(Gateway::new(
            Arc::new(connector.clone()),
            config.gateway_options(),
        ));

        let connected = gateway.connect_servers(&config.servers).await;
        if connected < config.servers.len() {
            warn!(
                connected,
                configured = config.servers.len(),
                "Some servers could not be pre-connected"
            );
        }

        Ok(Self {
            config,
            gateway,
            connector,
            response_headers,
        })
    }
}

fn build_headers(pairs: &[(String, String)]) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        headers.insert(
            HeaderName::from_bytes(name.as_bytes())?,
            HeaderValue::from_str(value)?,
        );
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_preconnects_default() {
        let state = AppState::new(GatewayConfig::default()).await.unwrap();
        assert!(state.gateway.registry().get(Some("default")).is_some());
        assert!(state.connector.server("localhost:27017").is_some());
    }

    #[tokio::test]
    async fn test_invalid_header_is_rejected() {
        let config = GatewayConfig {
            response_headers: vec![("Bad Header".into(), "x".into())],
            ..Default::default()
        };
        assert!(AppState::new(config).await.is_err());
    }
}
