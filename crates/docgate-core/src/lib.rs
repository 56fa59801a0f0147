//! # docgate-core
//!
//! Dispatch layer of the docgate HTTP gateway.
//!
//! This crate provides:
//! - **Extended JSON**: wrapped domain types and order-preserving documents
//! - **Connection Registry**: named, cached store connections
//! - **Cursor Pagination**: resumable batches over store query cursors
//! - **Dispatcher**: action routing onto built-in handlers, with batching
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        HTTP transport (docgate-cli)     │
//! ├─────────────────────────────────────────┤
//! │   Route → CommandRequest → Gateway      │
//! ├─────────────────────────────────────────┤
//! │  ConnectionRegistry  │  CursorManager   │
//! ├─────────────────────────────────────────┤
//! │        StoreClient (docgate-store)      │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use docgate_core::{Action, CommandRequest, Gateway, GatewayOptions};
//!
//! let gateway = Gateway::new(Arc::new(connector), GatewayOptions::default());
//! gateway.connect_servers(&["localhost:27017".to_string()]).await;
//!
//! let request = CommandRequest::new(Action::Find)
//!     .with_database("shop")
//!     .with_collection("orders");
//! let body = gateway.dispatch(&request).await.into_body();
//! ```

pub mod action;
pub mod codec;
pub mod cursor;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod output;
pub mod params;
pub mod registry;

pub use action::{Action, Route, ADMIN_DB};
pub use cursor::{Batch, CursorManager, DEFAULT_BATCH_SIZE};
pub use error::{GatewayError, Result};
pub use gateway::{startup_connection_name, Gateway, GatewayOptions};
pub use output::{is_valid_callback, render, Reply};
pub use params::{CommandRequest, Params};
pub use registry::{Connection, ConnectionLease, ConnectionRegistry, DEFAULT_CONNECTION, DEFAULT_SERVER};
