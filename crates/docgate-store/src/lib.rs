//! # docgate-store
//!
//! Document store driver seam for the docgate gateway.
//!
//! This crate provides:
//! - **Value model**: ordered documents, object ids, dates, regexes, binary
//! - **Driver traits**: `Connector`, `StoreClient` and `StoreCursor`
//! - **Memory engine**: an embedded in-memory store for development and tests
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Gateway dispatch             │
//! ├─────────────────────────────────────────┤
//! │   Connector → StoreClient → StoreCursor │
//! ├─────────────────────────────────────────┤
//! │        MemoryStore (or a driver)        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use docgate_store::{Connector, Endpoint, MemoryConnector};
//!
//! let connector = MemoryConnector::new().with_server("localhost:27017");
//! let client = connector.connect(&Endpoint::default()).await?;
//! let status = client.remove(&ns, Document::new()).await?;
//! ```

pub mod endpoint;
pub mod error;
pub mod memory;
pub mod ops;
pub mod query;
pub mod value;

pub use endpoint::{Credentials, Endpoint, DEFAULT_AUTH_SOURCE, DEFAULT_HOST, DEFAULT_PORT};
pub use error::{Result, StoreError, DUPLICATE_KEY_CODE};
pub use memory::{MemoryConnector, MemoryStore};
pub use ops::{FindOptions, IndexInfo, InsertOutcome, Namespace, SortDirection, UpdateSpec, WriteStatus};
pub use value::{Document, ObjectId, Value};

use async_trait::async_trait;
use std::sync::Arc;

/// Establishes connections to store endpoints
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to an endpoint, failing if it cannot be reached
    async fn connect(&self, endpoint: &Endpoint) -> Result<Arc<dyn StoreClient>>;
}

/// An established connection to a store server
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Endpoint this client is connected to
    fn endpoint(&self) -> &Endpoint;

    /// Authenticate against a database
    async fn authenticate(&self, db: &str, username: &str, password: &str) -> Result<()>;

    /// Run a generic command document. Command-level failures come back as
    /// an `ok: 0` document, not as an error.
    async fn run_command(&self, db: &str, command: Document) -> Result<Document>;

    /// Open a query cursor
    async fn find(&self, ns: &Namespace, options: FindOptions) -> Result<Box<dyn StoreCursor>>;

    /// Describe the plan a query would use
    async fn explain(&self, ns: &Namespace, options: FindOptions) -> Result<Document>;

    /// Insert documents, assigning `_id` where missing
    async fn insert(&self, ns: &Namespace, docs: Vec<Document>) -> Result<InsertOutcome>;

    /// Update matching documents
    async fn update(&self, ns: &Namespace, spec: UpdateSpec) -> Result<WriteStatus>;

    /// Remove matching documents
    async fn remove(&self, ns: &Namespace, criteria: Document) -> Result<WriteStatus>;

    /// List the indexes of a collection
    async fn index_information(&self, ns: &Namespace) -> Result<Vec<IndexInfo>>;

    /// Create an index if it does not exist and return its name
    async fn ensure_index(&self, ns: &Namespace, keys: Document, options: Document) -> Result<String>;

    /// Release the connection
    async fn close(&self);
}

/// A server-side result stream, pulled one document at a time
#[async_trait]
pub trait StoreCursor: Send {
    /// Next document, or `None` once exhausted
    async fn next(&mut self) -> Result<Option<Document>>;
}
