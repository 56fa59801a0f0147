//! Generic database commands

use crate::codec::decode_document;
use crate::gateway::Gateway;
use crate::params::CommandRequest;
use crate::{GatewayError, Result};
use docgate_store::{Document, Value};
use tracing::debug;

/// Run the `cmd` document against the request's database and echo the
/// store's reply. Failed commands carry the offending text under `cmd`.
pub async fn run(gateway: &Gateway, request: &CommandRequest) -> Result<Document> {
    let db = request.require_database()?;
    let text = request
        .params
        .get("cmd")
        .ok_or_else(|| GatewayError::validation("missing cmd"))?;
    let command = decode_document(text)?;

    let lease = gateway.registry().lease(request.connection()).await?;
    let mut reply = lease
        .client()
        .run_command(db, command)
        .await
        .map_err(|e| GatewayError::from_store(e, lease.name()).with_command(text))?;

    if !reply.get("ok").is_some_and(Value::is_truthy) {
        debug!(db, cmd = text, "Command reported failure");
        reply.insert("cmd".to_string(), Value::from(text));
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::gateway::GatewayOptions;
    use docgate_store::MemoryConnector;
    use std::sync::Arc;

    async fn connected() -> Gateway {
        let connector = MemoryConnector::new().with_server("localhost:27017");
        let gateway = Gateway::new(Arc::new(connector), GatewayOptions::default());
        gateway.registry().connect(None, "localhost").await.unwrap();
        gateway
    }

    fn cmd(text: &str) -> CommandRequest {
        CommandRequest::new(Action::Command)
            .with_database("shop")
            .with_param("cmd", text)
    }

    #[tokio::test]
    async fn test_ping() {
        let gateway = connected().await;
        let reply = run(&gateway, &cmd(r#"{"ping": 1}"#)).await.unwrap();
        assert_eq!(reply.get("ok"), Some(&Value::Int32(1)));
        assert!(!reply.contains_key("cmd"));
    }

    #[tokio::test]
    async fn test_unknown_command_echoes_text() {
        let gateway = connected().await;
        let reply = run(&gateway, &cmd(r#"{"frobnicate": 1}"#)).await.unwrap();
        assert_eq!(reply.get("ok"), Some(&Value::Int32(0)));
        assert_eq!(reply.get("cmd"), Some(&Value::from(r#"{"frobnicate": 1}"#)));
    }

    #[tokio::test]
    async fn test_ordered_command_document() {
        let gateway = connected().await;
        let text = r#"{"$ordered": [{"key": "count", "value": "items"}, {"key": "query", "value": {}}]}"#;
        let reply = run(&gateway, &cmd(text)).await.unwrap();
        assert_eq!(reply.get("n"), Some(&Value::from(0u64)));
    }

    #[tokio::test]
    async fn test_missing_cmd_and_bad_json() {
        let gateway = connected().await;
        let bare = CommandRequest::new(Action::Command).with_database("shop");
        assert_eq!(run(&gateway, &bare).await.unwrap_err().to_string(), "missing cmd");

        let err = run(&gateway, &cmd("{ping")).await.unwrap_err();
        assert!(matches!(err, GatewayError::Parse { .. }));
    }
}
