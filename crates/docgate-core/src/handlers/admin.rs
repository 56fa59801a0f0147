//! Liveness, status and connection lifecycle

use super::ok;
use crate::gateway::Gateway;
use crate::params::CommandRequest;
use crate::registry::DEFAULT_SERVER;
use crate::{GatewayError, Result};
use docgate_store::{Document, Value};

pub fn hello() -> Document {
    let mut doc = ok();
    doc.insert("msg".to_string(), Value::from("docgate is up"));
    doc
}

/// `{ok: 1, connections: {name: "host:port"}}`
pub fn status(gateway: &Gateway) -> Document {
    let connections: Document = gateway
        .registry()
        .status()
        .into_iter()
        .map(|(name, address)| (name, Value::String(address)))
        .collect();

    let mut doc = ok();
    doc.insert("connections".to_string(), Value::Document(connections));
    doc
}

pub async fn connect(gateway: &Gateway, request: &CommandRequest) -> Result<Document> {
    let server = request.params.get("server").unwrap_or(DEFAULT_SERVER);
    let connection = gateway.registry().connect(request.connection(), server).await?;

    let mut doc = ok();
    doc.insert("name".to_string(), Value::from(connection.name()));
    doc.insert("host".to_string(), Value::from(connection.endpoint().host.as_str()));
    doc.insert("port".to_string(), Value::Int32(i32::from(connection.endpoint().port)));
    Ok(doc)
}

pub async fn authenticate(gateway: &Gateway, request: &CommandRequest) -> Result<Document> {
    let db = request.require_database()?;
    let (Some(username), Some(password)) = (request.params.get("username"), request.params.get("password")) else {
        return Err(GatewayError::validation("username and password must be defined"));
    };

    gateway
        .registry()
        .authenticate(request.connection(), db, username, password)
        .await?;
    Ok(ok())
}

pub async fn disconnect(gateway: &Gateway, request: &CommandRequest) -> Result<Document> {
    gateway.disconnect(request.connection()).await?;
    Ok(ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::gateway::GatewayOptions;
    use docgate_store::MemoryConnector;
    use std::sync::Arc;

    fn gateway() -> Gateway {
        let connector = MemoryConnector::new().with_server("localhost:27017");
        Gateway::new(Arc::new(connector), GatewayOptions::default())
    }

    #[tokio::test]
    async fn test_connect_reports_endpoint() {
        let gateway = gateway();
        let doc = connect(&gateway, &CommandRequest::new(Action::Connect)).await.unwrap();
        assert_eq!(doc.get("host"), Some(&Value::from("localhost")));
        assert_eq!(doc.get("port"), Some(&Value::Int32(27017)));

        let status = status(&gateway);
        let connections = status.get("connections").and_then(Value::as_document).unwrap();
        assert_eq!(connections.get("default"), Some(&Value::from("localhost:27017")));
    }

    #[tokio::test]
    async fn test_authenticate_requires_credentials() {
        let gateway = gateway();
        let request = CommandRequest::new(Action::Authenticate)
            .with_database("shop")
            .with_param("username", "alice");
        let err = authenticate(&gateway, &request).await.unwrap_err();
        assert_eq!(err.to_string(), "username and password must be defined");
    }

    #[tokio::test]
    async fn test_disconnect_unknown_name() {
        let gateway = gateway();
        let request = CommandRequest::new(Action::Disconnect).with_param("name", "ghost");
        assert!(matches!(
            disconnect(&gateway, &request).await,
            Err(GatewayError::NoConnection { .. })
        ));
    }
}
