//! Gateway configuration

use docgate_core::GatewayOptions;
use docgate_store::Endpoint;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Gateway server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory served by the static file fallback
    pub docroot: PathBuf,
    /// Store servers to pre-connect on startup
    pub servers: Vec<String>,
    /// Send `Access-Control-Allow-Origin: *` on every response
    pub xorigin: bool,
    /// Extra headers added to every response
    pub response_headers: Vec<(String, String)>,
    /// Connect timeout (milliseconds)
    pub connect_timeout_ms: u64,
    /// Idle cursor lifetime (seconds); unset keeps cursors forever
    pub cursor_ttl_secs: Option<u64>,
    /// Interval between idle cursor sweeps (seconds)
    pub cursor_sweep_secs: u64,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 27080,
            docroot: PathBuf::from("."),
            servers: vec!["localhost:27017".to_string()],
            xorigin: false,
            response_headers: Vec::new(),
            connect_timeout_ms: 2000,
            cursor_ttl_secs: None,
            cursor_sweep_secs: 60,
            max_body_size: 16 * 1024 * 1024, // 16 MiB
        }
    }
}

impl GatewayConfig {
    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn gateway_options(&self) -> GatewayOptions {
        GatewayOptions {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            cursor_ttl: self.cursor_ttl_secs.map(Duration::from_secs),
        }
    }

    /// Configured response headers, including the cross-origin header
    /// Configured servers as `host:port`, safe to log
    pub fn server_addresses(&self) -> Vec<String> {
        self.servers
            .iter()
            .map(|server| match Endpoint::parse(server) {
                Ok(endpoint) => endpoint.address(),
                Err(_) => "<invalid>".to_string(),
            })
            .collect()
    }

    pub fn extra_headers(&self) -> Vec<(String, String)> {
        let mut headers = self.response_headers.clone();
        if self.xorigin {
            headers.push(("Access-Control-Allow-Origin".to_string(), "*".to_string()));
        }
        headers
    }
}

/// Parse a `Name: value` header argument
pub fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got {raw:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in {raw:?}"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
