//! Response rendering and JSONP wrapping

use crate::codec::encode_document;
use docgate_store::{Document, Value};

/// Output of one dispatched request
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    /// A single JSON document
    Document(Document),
    /// Pre-encoded batch segments, joined into a JSON array
    Batch(Vec<String>),
}

impl Reply {
    /// Encode as JSON text
    pub fn into_body(self) -> String {
        match self {
            Self::Document(doc) => encode_document(&doc),
            Self::Batch(segments) => format!("[{}]", segments.join(",")),
        }
    }
}

/// Whether `name` may be used as a JSONP callback: a non-empty dotted path
/// of identifier characters
pub fn is_valid_callback(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'))
}

/// Render a reply, wrapping it as `callback(<json>)` when a callback is set.
/// An unusable callback name replaces the reply with an unwrapped error.
pub fn render(reply: Reply, callback: Option<&str>) -> String {
    match callback {
        None => reply.into_body(),
        Some(name) if is_valid_callback(name) => format!("{name}({})", reply.into_body()),
        Some(_) => {
            let mut doc = Document::new();
            doc.insert("ok".to_string(), Value::Int32(0));
            doc.insert("errmsg".to_string(), Value::from("invalid callback name"));
            encode_document(&doc)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok() -> Reply {
        let mut doc = Document::new();
        doc.insert("ok".to_string(), Value::Int32(1));
        Reply::Document(doc)
    }

    #[test]
    fn test_batch_body() {
        let reply = Reply::Batch(vec![r#"{"ok":1}"#.into(), r#"{"ok":0}"#.into()]);
        assert_eq!(reply.into_body(), r#"[{"ok":1},{"ok":0}]"#);
        assert_eq!(Reply::Batch(vec![]).into_body(), "[]");
    }

    #[test]
    fn test_jsonp_wrapping() {
        assert_eq!(render(ok(), None), r#"{"ok":1}"#);
        assert_eq!(render(ok(), Some("app.cb_1$")), r#"app.cb_1$({"ok":1})"#);
    }

    #[test]
    fn test_invalid_callback() {
        for name in ["", "alert(1)", "a b", "x;y"] {
            assert_eq!(
                render(ok(), Some(name)),
                r#"{"ok":0,"errmsg":"invalid callback name"}"#,
                "{name:?}"
            );
        }
    }
}
