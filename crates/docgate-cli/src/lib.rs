//! # docgate
//!
//! HTTP transport for the docgate document-store gateway.
//!
//! This crate provides:
//! - **Routing**: `/database/collection/_action` paths onto the dispatcher
//! - **Parameters**: query strings and urlencoded form bodies
//! - **JSONP**: optional `callback` wrapping
//! - **Static files**: a docroot fallback for plain GETs
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   HTTP Clients                      │
//! │          (browsers, curl, scripts via JSONP)        │
//! └─────────────────────────┬───────────────────────────┘
//!                           │
//! ┌─────────────────────────▼───────────────────────────┐
//! │                      docgate                        │
//! ├─────────────────────────────────────────────────────┤
//! │  Request ID │ Logging │ Response headers │ Trace    │
//! ├─────────────────────────────────────────────────────┤
//! │         Route parser │ Static file fallback         │
//! ├─────────────────────────────────────────────────────┤
//! │                   docgate-core                      │
//! │      (Registry, Cursors, Dispatcher, Batches)       │
//! ├─────────────────────────────────────────────────────┤
//! │                   docgate-store                     │
//! │          (Driver seam, embedded engine)             │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use server::run_server;
pub use state::AppState;
