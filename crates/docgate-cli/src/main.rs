//! docgate - HTTP gateway for document stores

use clap::Parser;
use docgate_cli::{config::parse_header, GatewayConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "docgate")]
#[command(about = "REST and JSONP gateway for document stores")]
#[command(version)]
struct Args {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "DOCGATE_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "27080", env = "DOCGATE_PORT")]
    port: u16,

    /// Directory for the static file fallback
    #[arg(short = 'd', long, default_value = ".", env = "DOCGATE_DOCROOT")]
    docroot: PathBuf,

    /// Comma-separated store servers to connect to on startup
    #[arg(
        short,
        long,
        value_delimiter = ',',
        default_value = "localhost:27017",
        env = "DOCGATE_SERVERS"
    )]
    servers: Vec<String>,

    /// Allow cross-origin requests from any origin
    #[arg(short = 'x', long, env = "DOCGATE_XORIGIN")]
    xorigin: bool,

    /// Extra response header as `Name: value` (repeatable)
    #[arg(long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Connect timeout in milliseconds
    #[arg(long, default_value = "2000", env = "DOCGATE_CONNECT_TIMEOUT_MS")]
    connect_timeout_ms: u64,

    /// Evict cursors idle for this many seconds (default: never)
    #[arg(long, env = "DOCGATE_CURSOR_TTL_SECS")]
    cursor_ttl_secs: Option<u64>,

    /// Seconds between idle cursor sweeps
    #[arg(long, default_value = "60", env = "DOCGATE_CURSOR_SWEEP_SECS")]
    cursor_sweep_secs: u64,

    /// Maximum request body size in bytes
    #[arg(long, default_value = "16777216", env = "DOCGATE_MAX_BODY_SIZE")]
    max_body_size: usize,

    /// Enable debug logging
    #[arg(long, env = "DOCGATE_DEBUG")]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("docgate_cli={log_level},docgate_core={log_level},tower_http=debug").into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting docgate on {}:{}", args.host, args.port);

    if args.xorigin {
        tracing::warn!("Cross-origin requests are allowed from any origin");
    }

    let config = GatewayConfig {
        host: args.host,
        port: args.port,
        docroot: args.docroot,
        servers: args.servers,
        xorigin: args.xorigin,
        response_headers: args.headers,
        connect_timeout_ms: args.connect_timeout_ms,
        cursor_ttl_secs: args.cursor_ttl_secs,
        cursor_sweep_secs: args.cursor_sweep_secs,
        max_body_size: args.max_body_size,
    };

    run_server_with_ctrl_c(config).await
}

async fn run_server_with_ctrl_c(config: GatewayConfig) -> anyhow::Result<()> {
    docgate_cli::server::run_server_with_shutdown(config, async {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
        }
    })
    .await
}
