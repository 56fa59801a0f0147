//! Built-in action handlers
//!
//! Each handler turns one [`CommandRequest`] into one response document.

pub mod admin;
pub mod batch;
pub mod command;
pub mod query;
pub mod write;

use crate::codec::decode_document;
use crate::params::CommandRequest;
use crate::Result;
use docgate_store::{Document, Value, WriteStatus};

/// `{ok: 1}`
pub(crate) fn ok() -> Document {
    let mut doc = Document::new();
    doc.insert("ok".to_string(), Value::Int32(1));
    doc
}

/// Decode an optional document parameter
pub(crate) fn optional_document(request: &CommandRequest, key: &str) -> Result<Option<Document>> {
    request.params.get(key).map(decode_document).transpose()
}

/// The write status when `safe` is truthy, otherwise a bare acknowledgment
pub(crate) fn write_reply(request: &CommandRequest, status: &WriteStatus) -> Document {
    if request.params.is_truthy("safe") {
        status.to_document()
    } else {
        ok()
    }
}
