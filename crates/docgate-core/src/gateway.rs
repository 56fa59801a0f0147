//! The dispatcher: owns the connection registry and the cursor table

use crate::action::Action;
use crate::cursor::CursorManager;
use crate::handlers::{admin, batch, command, query, write};
use crate::output::Reply;
use crate::params::CommandRequest;
use crate::registry::{redact_userinfo, ConnectionRegistry, DEFAULT_CONNECTION};
use crate::{GatewayError, Result};
use docgate_store::{Connector, Document, Endpoint};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Tunables for a [`Gateway`]
#[derive(Clone, Debug)]
pub struct GatewayOptions {
    /// Upper bound on establishing a connection
    pub connect_timeout: Duration,
    /// Idle time after which a cursor may be swept; `None` keeps cursors
    /// until process exit
    pub cursor_ttl: Option<Duration>,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            cursor_ttl: None,
        }
    }
}

/// Shared dispatch state. One instance serves every request.
pub struct Gateway {
    registry: ConnectionRegistry,
    cursors: CursorManager,
    options: GatewayOptions,
}

impl Gateway {
    pub fn new(connector: Arc<dyn Connector>, options: GatewayOptions) -> Self {
        Self {
            registry: ConnectionRegistry::new(connector, options.connect_timeout),
            cursors: CursorManager::new(),
            options,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn cursors(&self) -> &CursorManager {
        &self.cursors
    }

    pub fn options(&self) -> &GatewayOptions {
        &self.options
    }

    /// Pre-connect the configured servers and return how many succeeded.
    /// Failures are logged; the gateway still starts.
    pub async fn connect_servers(&self, servers: &[String]) -> usize {
        let mut connected = 0;
        for server in servers {
            let name = startup_connection_name(servers, server);
            match self.registry.connect(Some(&name), server).await {
                Ok(conn) => {
                    info!(connection = %name, endpoint = %conn.endpoint(), "Pre-connected");
                    connected += 1;
                }
                Err(e) => warn!(connection = %name, server = %redact_userinfo(server), error = %e, "Pre-connect failed"),
            }
        }
        connected
    }

    /// Close a connection and drop the cursors opened on it
    pub async fn disconnect(&self, name: Option<&str>) -> Result<()> {
        let connection = self.registry.disconnect(name).await?;
        self.cursors.evict_connection(&connection);
        Ok(())
    }

    /// Evict idle cursors when a TTL is configured
    pub fn sweep_cursors(&self) -> usize {
        match self.options.cursor_ttl {
            Some(ttl) => self.cursors.cleanup_expired(ttl),
            None => 0,
        }
    }

    /// Run a request. Failures are rendered into the reply, never returned.
    pub async fn dispatch(&self, request: &CommandRequest) -> Reply {
        debug!(
            action = %request.action,
            db = ?request.database,
            collection = ?request.collection,
            "Dispatching"
        );

        match request.action {
            Action::Batch => batch::run(self, request).await,
            _ => Reply::Document(self.execute(request).await.unwrap_or_else(|e| {
                log_failure(request.action, &e);
                e.to_document()
            })),
        }
    }

    /// Run a single non-batch request
    pub async fn execute(&self, request: &CommandRequest) -> Result<Document> {
        match request.action {
            Action::Hello => Ok(admin::hello()),
            Action::Status => Ok(admin::status(self)),
            Action::Connect => admin::connect(self, request).await,
            Action::Authenticate => admin::authenticate(self, request).await,
            Action::Disconnect => admin::disconnect(self, request).await,
            Action::Command => command::run(self, request).await,
            Action::Find => query::find(self, request).await,
            Action::More => query::more(self, request).await,
            Action::Insert => write::insert(self, request).await,
            Action::Update => write::update(self, request).await,
            Action::InsertOrUpdate => write::insert_or_update(self, request).await,
            Action::Remove => write::remove(self, request).await,
            Action::EnsureIndex => write::ensure_index(self, request).await,
            Action::Batch => Err(GatewayError::validation("batch requests cannot be nested")),
        }
    }
}

/// A single configured server becomes `default`; several are named after
/// their `host:port` with `.` and `:` removed
pub fn startup_connection_name(servers: &[String], server: &str) -> String {
    if servers.len() == 1 {
        return DEFAULT_CONNECTION.to_string();
    }
    let address = Endpoint::parse(server)
        .map(|endpoint| endpoint.address())
        .unwrap_or_else(|_| redact_userinfo(server));
    address.chars().filter(|c| !matches!(c, '.' | ':')).collect()
}

fn log_failure(action: Action, err: &GatewayError) {
    match err {
        GatewayError::Transient { .. } | GatewayError::Operation { .. } => {
            error!(action = %action, error = %err, "Store call failed")
        }
        GatewayError::ConnectFailed { .. } | GatewayError::CursorInterrupted { .. } => {
            warn!(action = %action, error = %err, "Request failed")
        }
        _ => debug!(action = %action, error = %err, "Request rejected"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgate_store::MemoryConnector;

    #[test]
    fn test_startup_names() {
        let one = vec!["db1.example.com:27017".to_string()];
        assert_eq!(startup_connection_name(&one, &one[0]), "default");

        let two = vec!["10.0.0.1:27017".to_string(), "10.0.0.2:27018".to_string()];
        assert_eq!(startup_connection_name(&two, &two[0]), "1000127017");
        assert_eq!(startup_connection_name(&two, &two[1]), "1000227018");

        let uris = vec!["mongodb://app:pw@db1:27017/shop".to_string(), "db2".to_string()];
        assert_eq!(startup_connection_name(&uris, &uris[0]), "db127017");
        assert_eq!(startup_connection_name(&uris, &uris[1]), "db227017");
    }

    #[tokio::test]
    async fn test_connect_servers_skips_unreachable() {
        let connector = MemoryConnector::new().with_server("10.0.0.1:27017");
        let gateway = Gateway::new(Arc::new(connector), GatewayOptions::default());
        let servers = vec!["10.0.0.1:27017".to_string(), "10.0.0.9:27017".to_string()];

        assert_eq!(gateway.connect_servers(&servers).await, 1);
        assert!(gateway.registry().get(Some("1000127017")).is_some());
        assert!(gateway.registry().get(Some("1000927017")).is_none());
    }

    #[tokio::test]
    async fn test_sweep_without_ttl_keeps_cursors() {
        let gateway = Gateway::new(Arc::new(MemoryConnector::new()), GatewayOptions::default());
        assert_eq!(gateway.sweep_cursors(), 0);
    }

    #[tokio::test]
    async fn test_nested_batch_is_rejected_by_execute() {
        let gateway = Gateway::new(Arc::new(MemoryConnector::new()), GatewayOptions::default());
        let err = gateway.execute(&CommandRequest::new(Action::Batch)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Validation(_)));
    }
}
