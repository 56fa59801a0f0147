//! Inserts, updates, removes and index creation

use super::{ok, optional_document, write_reply};
use crate::codec::{decode_document, decode_documents};
use crate::gateway::Gateway;
use crate::params::CommandRequest;
use crate::registry::ConnectionLease;
use crate::{GatewayError, Result};
use docgate_store::{Document, Namespace, UpdateSpec, Value};
use tracing::debug;

/// Insert one document or an array of documents from `docs`
pub async fn insert(gateway: &Gateway, request: &CommandRequest) -> Result<Document> {
    let ns = request.namespace()?;
    let text = request
        .params
        .get("docs")
        .ok_or_else(|| GatewayError::validation("missing docs"))?;
    let docs = decode_documents(text)?;

    let lease = gateway.registry().lease(request.connection()).await?;
    let outcome = lease
        .client()
        .insert(&ns, docs)
        .await
        .map_err(|e| GatewayError::from_store(e, lease.name()))?;
    debug!(ns = %ns, count = outcome.ids.len(), "Inserted");

    let mut doc = ok();
    doc.insert("oids".to_string(), Value::Array(outcome.ids));
    if request.params.is_truthy("safe") {
        doc.insert("status".to_string(), Value::Document(outcome.status.to_document()));
    }
    Ok(doc)
}

/// Update documents matching `criteria` with `newobj`.
///
/// A single-document upsert may omit `criteria`; it is then derived from
/// the unique indexes whose fields `newobj` carries at the top level.
pub async fn update(gateway: &Gateway, request: &CommandRequest) -> Result<Document> {
    let ns = request.namespace()?;
    let params = &request.params;
    let upsert = params.is_truthy("upsert");
    let multi = params.is_truthy("multi");

    let criteria_text = params.get("criteria");
    if criteria_text.is_none() && !(upsert && !multi) {
        return Err(GatewayError::validation("missing criteria"));
    }
    let newobj = params
        .get("newobj")
        .ok_or_else(|| GatewayError::validation("missing newobj"))
        .and_then(decode_document)?;

    let lease = gateway.registry().lease(request.connection()).await?;
    let criteria = match criteria_text {
        Some(text) => decode_document(text)?,
        None => unique_criteria(&lease, &ns, &newobj).await?,
    };

    let spec = UpdateSpec {
        criteria,
        update: newobj,
        upsert,
        multi,
    };
    let status = lease
        .client()
        .update(&ns, spec)
        .await
        .map_err(|e| GatewayError::from_store(e, lease.name()))?;
    debug!(ns = %ns, n = status.n, upsert, multi, "Updated");

    Ok(write_reply(request, &status))
}

/// [`update`] with `upsert` forced on
pub async fn insert_or_update(gateway: &Gateway, request: &CommandRequest) -> Result<Document> {
    let mut request = request.clone();
    request.params.set("upsert", "true");
    update(gateway, &request).await
}

/// Remove documents matching `criteria`. Without criteria every document in
/// the collection is removed.
pub async fn remove(gateway: &Gateway, request: &CommandRequest) -> Result<Document> {
    let ns = request.namespace()?;
    let criteria = optional_document(request, "criteria")?.unwrap_or_default();

    let lease = gateway.registry().lease(request.connection()).await?;
    let status = lease
        .client()
        .remove(&ns, criteria)
        .await
        .map_err(|e| GatewayError::from_store(e, lease.name()))?;
    debug!(ns = %ns, n = status.n, "Removed");

    Ok(write_reply(request, &status))
}

/// Create an index from the ordered `keys` document
pub async fn ensure_index(gateway: &Gateway, request: &CommandRequest) -> Result<Document> {
    let ns = request.namespace()?;
    let keys = request
        .params
        .get("keys")
        .ok_or_else(|| GatewayError::validation("missing keys"))
        .and_then(decode_document)?;
    let options = optional_document(request, "options")?.unwrap_or_default();

    let lease = gateway.registry().lease(request.connection()).await?;
    let name = lease
        .client()
        .ensure_index(&ns, keys, options)
        .await
        .map_err(|e| GatewayError::from_store(e, lease.name()))?;
    debug!(ns = %ns, index = %name, "Index ensured");

    let mut doc = ok();
    doc.insert("name".to_string(), Value::String(name));
    Ok(doc)
}

/// Criteria built from every unique index field present in `newobj`
async fn unique_criteria(lease: &ConnectionLease, ns: &Namespace, newobj: &Document) -> Result<Document> {
    let indexes = lease
        .client()
        .index_information(ns)
        .await
        .map_err(|e| GatewayError::from_store(e, lease.name()))?;

    let mut criteria = Document::new();
    for index in indexes.iter().filter(|i| i.is_unique()) {
        for field in index.key.keys() {
            if let Some(value) = newobj.get(field) {
                criteria.insert(field.clone(), value.clone());
            }
        }
    }

    if criteria.is_empty() {
        return Err(GatewayError::validation("missing criteria"));
    }
    Ok(criteria)
}
