//! Named connection registry
//!
//! Connections are created by an explicit connect and live until an explicit
//! disconnect. Lookups never connect implicitly. Store calls go through a
//! [`ConnectionLease`], which keeps the connection alive until the call
//! returns; a disconnect evicts the entry first and then waits for
//! outstanding leases before closing the client.

use crate::{GatewayError, Result};
use dashmap::DashMap;
use docgate_store::{Connector, Endpoint, StoreClient};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedRwLockReadGuard, RwLock};
use tracing::{debug, info, warn};

/// Name used when a request does not select a connection
pub const DEFAULT_CONNECTION: &str = "default";

/// Server used by `_connect` when none is given
pub const DEFAULT_SERVER: &str = "localhost:27017";

type ClientSlot = Option<Arc<dyn StoreClient>>;

/// A registered connection
pub struct Connection {
    name: String,
    endpoint: Endpoint,
    client: Arc<RwLock<ClientSlot>>,
}

impl Connection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Borrow the client for the duration of a store call. Fails once the
    /// connection has been torn down, even if the name was reconnected.
    pub async fn lease(self: &Arc<Self>) -> Result<ConnectionLease> {
        let guard = Arc::clone(&self.client).read_owned().await;
        let client = Option::clone(&guard).ok_or_else(|| GatewayError::NoConnection {
            name: self.name.clone(),
        })?;
        Ok(ConnectionLease {
            connection: Arc::clone(self),
            client,
            _guard: guard,
        })
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Shared access to a connection's client. Teardown waits until every lease
/// is dropped.
pub struct ConnectionLease {
    connection: Arc<Connection>,
    client: Arc<dyn StoreClient>,
    _guard: OwnedRwLockReadGuard<ClientSlot>,
}

impl ConnectionLease {
    pub fn name(&self) -> &str {
        self.connection.name()
    }

    /// The connection this lease keeps alive
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn client(&self) -> &dyn StoreClient {
        self.client.as_ref()
    }
}

/// Registry of named connections
pub struct ConnectionRegistry {
    connector: Arc<dyn Connector>,
    connections: DashMap<String, Arc<Connection>>,
    /// Serializes connection establishment
    connect_lock: Mutex<()>,
    connect_timeout: Duration,
}

impl ConnectionRegistry {
    pub fn new(connector: Arc<dyn Connector>, connect_timeout: Duration) -> Self {
        Self {
            connector,
            connections: DashMap::new(),
            connect_lock: Mutex::new(()),
            connect_timeout,
        }
    }

    /// Connect `name` to `server`, or return the existing connection of that
    /// name unchanged. Failures leave the registry untouched.
    pub async fn connect(&self, name: Option<&str>, server: &str) -> Result<Arc<Connection>> {
        let name = name.unwrap_or(DEFAULT_CONNECTION);
        if let Some(existing) = self.get(Some(name)) {
            return Ok(existing);
        }

        let _serial = self.connect_lock.lock().await;
        if let Some(existing) = self.get(Some(name)) {
            return Ok(existing);
        }

        let shown = redact_userinfo(server);
        let failed = |reason: String| {
            warn!(connection = name, server = %shown, reason = %reason, "Connect failed");
            GatewayError::ConnectFailed {
                server: shown.clone(),
                name: name.to_string(),
                reason,
            }
        };

        let endpoint = Endpoint::parse(server).map_err(|e| failed(e.to_string()))?;
        let client = match tokio::time::timeout(self.connect_timeout, self.connector.connect(&endpoint)).await {
            Ok(Ok(client)) => client,
            Ok(Err(e)) => return Err(failed(e.to_string())),
            Err(_) => {
                return Err(failed(format!(
                    "timed out after {} ms",
                    self.connect_timeout.as_millis()
                )))
            }
        };

        let connection = Arc::new(Connection {
            name: name.to_string(),
            endpoint,
            client: Arc::new(RwLock::new(Some(client))),
        });
        self.connections.insert(name.to_string(), Arc::clone(&connection));

        info!(connection = name, endpoint = %connection.endpoint, "Connection registered");
        Ok(connection)
    }

    /// Look up a connection without connecting
    pub fn get(&self, name: Option<&str>) -> Option<Arc<Connection>> {
        let name = name.unwrap_or(DEFAULT_CONNECTION);
        self.connections.get(name).map(|c| Arc::clone(c.value()))
    }

    /// Look up and lease a connection
    pub async fn lease(&self, name: Option<&str>) -> Result<ConnectionLease> {
        let connection = self.get(name).ok_or_else(|| GatewayError::NoConnection {
            name: name.unwrap_or(DEFAULT_CONNECTION).to_string(),
        })?;
        connection.lease().await
    }

    /// Forward credentials for `db` on a connection
    pub async fn authenticate(&self, name: Option<&str>, db: &str, username: &str, password: &str) -> Result<()> {
        let lease = self.lease(name).await?;
        lease
            .client()
            .authenticate(db, username, password)
            .await
            .map_err(|e| GatewayError::from_store(e, lease.name()))?;
        debug!(connection = lease.name(), db, username, "Authenticated");
        Ok(())
    }

    /// Evict and close a connection, returning the closed entry
    pub async fn disconnect(&self, name: Option<&str>) -> Result<Arc<Connection>> {
        let name = name.unwrap_or(DEFAULT_CONNECTION);
        let (_, connection) = self.connections.remove(name).ok_or_else(|| GatewayError::NoConnection {
            name: name.to_string(),
        })?;

        let client = connection.client.write().await.take();
        if let Some(client) = client {
            client.close().await;
        }

        info!(connection = name, endpoint = %connection.endpoint, "Connection closed");
        Ok(connection)
    }

    /// Registered connections as `name -> host:port`
    pub fn status(&self) -> BTreeMap<String, String> {
        self.connections
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().endpoint.address()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// Mask `user:pass@` so a server URI can be echoed or logged
pub(crate) fn redact_userinfo(server: &str) -> String {
    match server.rsplit_once('@') {
        Some((userinfo, rest)) => {
            let scheme = userinfo.find("://").map_or("", |i| &userinfo[..i + 3]);
            format!("{scheme}***@{rest}")
        }
        None => server.to_string(),
    }
}
