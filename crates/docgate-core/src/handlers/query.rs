//! Queries and cursor paging

use super::{ok, optional_document};
use crate::codec::decode;
use crate::cursor::DEFAULT_BATCH_SIZE;
use crate::gateway::Gateway;
use crate::params::CommandRequest;
use crate::{GatewayError, Result};
use docgate_store::{Document, FindOptions, SortDirection, Value};

/// Open a cursor and return its first batch, or the query plan when
/// `explain` is set
pub async fn find(gateway: &Gateway, request: &CommandRequest) -> Result<Document> {
    let ns = request.namespace()?;
    let params = &request.params;

    let options = FindOptions {
        criteria: optional_document(request, "criteria")?.unwrap_or_default(),
        projection: projection(request)?,
        sort: sort(request)?,
        skip: params.get_u64("skip", 0)?,
        limit: params.get_u64("limit", 0)?,
    };
    let batch_size = params.get_u64("batch_size", DEFAULT_BATCH_SIZE)?;

    let lease = gateway.registry().lease(request.connection()).await?;
    let client = lease.client();

    if params.is_truthy("explain") {
        let plan = client
            .explain(&ns, options)
            .await
            .map_err(|e| GatewayError::from_store(e, lease.name()))?;
        let mut doc = Document::new();
        doc.insert("results".to_string(), Value::Array(vec![Value::Document(plan)]));
        doc.extend(ok());
        return Ok(doc);
    }

    let handle = client
        .find(&ns, options)
        .await
        .map_err(|e| GatewayError::from_store(e, lease.name()))?;
    let batch = gateway.cursors().open(&lease, handle, batch_size).await?;
    Ok(batch.to_document())
}

/// Continue an open cursor
pub async fn more(gateway: &Gateway, request: &CommandRequest) -> Result<Document> {
    if !request.params.contains("id") {
        return Err(GatewayError::validation("no cursor id given"));
    }
    let id = request.params.get_u64("id", 0)?;
    let batch_size = request.params.get_u64("batch_size", DEFAULT_BATCH_SIZE)?;

    Ok(gateway.cursors().next_batch(id, batch_size).await?.to_document())
}

/// `fields` is a projection document or a list of field names to include
fn projection(request: &CommandRequest) -> Result<Option<Document>> {
    let Some(text) = request.params.get("fields") else {
        return Ok(None);
    };

    match decode(text)? {
        Value::Document(doc) => Ok(Some(doc)),
        Value::Array(names) => names
            .into_iter()
            .map(|name| match name {
                Value::String(name) => Ok((name, Value::Int32(1))),
                _ => Err(GatewayError::Shape {
                    expected: "a list of field names",
                    input: text.to_string(),
                }),
            })
            .collect::<Result<Document>>()
            .map(Some),
        _ => Err(GatewayError::Shape {
            expected: "iterable",
            input: text.to_string(),
        }),
    }
}

/// Sort keys in document order; `-1` means descending
fn sort(request: &CommandRequest) -> Result<Vec<(String, SortDirection)>> {
    let Some(spec) = optional_document(request, "sort")? else {
        return Ok(Vec::new());
    };

    Ok(spec
        .into_iter()
        .map(|(field, direction)| {
            let direction = if direction.as_i64() == Some(-1) {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            (field, direction)
        })
        .collect())
}
