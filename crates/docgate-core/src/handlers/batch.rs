//! Batch multiplexing
//!
//! `requests` holds a JSON array of sub-requests:
//!
//! ```json
//! [{"action": "_find", "db": "shop", "collection": "orders", "args": {"criteria": "{}"}}]
//! ```
//!
//! Each runs in order and contributes one element to the reply array.
//! Entries without a usable action are skipped.

use crate::action::Action;
use crate::codec::{decode_iterable, encode, encode_document};
use crate::gateway::Gateway;
use crate::output::Reply;
use crate::params::{CommandRequest, Params};
use crate::GatewayError;
use docgate_store::{Document, Value};
use tracing::debug;

pub async fn run(gateway: &Gateway, request: &CommandRequest) -> Reply {
    let entries = match parse_requests(request) {
        Ok(entries) => entries,
        Err(e) => return Reply::Document(e.to_document()),
    };

    let mut segments = Vec::with_capacity(entries.len());
    for (position, entry) in entries.iter().enumerate() {
        let Some(sub) = sub_request(entry) else {
            debug!(position, "Skipping batch entry without a runnable action");
            continue;
        };

        let reply = gateway
            .execute(&sub)
            .await
            .unwrap_or_else(|e| e.to_document());
        segments.push(encode_document(&reply));
    }

    debug!(requested = entries.len(), executed = segments.len(), "Batch complete");
    Reply::Batch(segments)
}

fn parse_requests(request: &CommandRequest) -> crate::Result<Vec<Value>> {
    let text = request
        .params
        .get("requests")
        .ok_or_else(|| GatewayError::validation("missing requests"))?;

    match decode_iterable(text)? {
        Value::Array(entries) => Ok(entries),
        _ => Err(GatewayError::Shape {
            expected: "an array",
            input: text.to_string(),
        }),
    }
}

/// Build a sub-request, or `None` when the entry has no runnable action
fn sub_request(entry: &Value) -> Option<CommandRequest> {
    let entry = entry.as_document()?;
    let token = entry
        .get("action")
        .or_else(|| entry.get("cmd"))
        .and_then(Value::as_str)?;
    let action = Action::from_token(token).or_else(|| Action::from_name(token))?;
    if action == Action::Batch {
        return None;
    }

    if let Some(method) = entry.get("method").and_then(Value::as_str) {
        debug!(action = %action, method, "Batch entry");
    }

    let mut sub = CommandRequest::new(action);
    sub.database = entry.get("db").and_then(Value::as_str).map(str::to_string);
    sub.collection = entry.get("collection").and_then(Value::as_str).map(str::to_string);
    if let Some(args) = entry.get("args").and_then(Value::as_document) {
        sub.params = args_to_params(args);
    }
    Some(sub)
}

/// Strings pass through, arrays of strings contribute one value per
/// element, and any other value is re-encoded as JSON text
fn args_to_params(args: &Document) -> Params {
    let mut params = Params::new();
    for (key, value) in args {
        match value {
            Value::String(s) => params.insert(key.clone(), s.clone()),
            Value::Array(items) if !items.is_empty() && items.iter().all(|i| i.as_str().is_some()) => {
                for item in items.iter().filter_map(Value::as_str) {
                    params.insert(key.clone(), item);
                }
            }
            other => params.insert(key.clone(), encode(other)),
        }
    }
    params
}
