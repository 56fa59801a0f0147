//! Error types for the docgate-core crate

use docgate_store::{Document, StoreError, Value};
use thiserror::Error;

/// Result type alias using `GatewayError`
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors raised while dispatching a request. Every variant renders to an
/// `{ok: 0, errmsg, ...}` document; none escape to the transport.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// Parameter is not valid JSON
    #[error("couldn't parse json: {input}")]
    Parse { input: String },

    /// Parameter decoded to the wrong shape
    #[error("type is not {expected}: {input}")]
    Shape { expected: &'static str, input: String },

    /// No registry entry for the connection name
    #[error("couldn't get connection")]
    NoConnection { name: String },

    /// Endpoint unreachable or malformed
    #[error("could not connect")]
    ConnectFailed { server: String, name: String, reason: String },

    /// Connectivity lost during a store call
    #[error("wasn't connected to the db and couldn't reconnect")]
    Transient { name: String },

    /// Connectivity lost while paging a cursor; the cursor is still open
    #[error("auto reconnecting, please try again")]
    CursorInterrupted { id: u64 },

    /// Store-reported failure
    #[error("{message}")]
    Operation {
        message: String,
        code: Option<i32>,
        /// Offending command text, echoed for diagnosis
        command: Option<String>,
    },

    /// Missing or malformed parameter
    #[error("{0}")]
    Validation(String),

    /// Unknown cursor id
    #[error("couldn't find the cursor with id {0}")]
    CursorNotFound(u64),
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Classify a store failure that happened on connection `name`
    pub fn from_store(err: StoreError, name: &str) -> Self {
        match err {
            StoreError::Transient(_) | StoreError::Timeout { .. } | StoreError::Connection(_) => {
                Self::Transient {
                    name: name.to_string(),
                }
            }
            StoreError::Operation { message, code } => Self::Operation {
                message,
                code,
                command: None,
            },
            StoreError::AuthenticationFailed => Self::Operation {
                message: "authentication failed".to_string(),
                code: None,
                command: None,
            },
            StoreError::InvalidEndpoint(message) => Self::Validation(message),
        }
    }

    /// Whether the client may retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::CursorInterrupted { .. })
    }

    /// Attach the offending command text to an operation failure
    pub fn with_command(self, text: &str) -> Self {
        match self {
            Self::Operation { message, code, .. } => Self::Operation {
                message,
                code,
                command: Some(text.to_string()),
            },
            other => other,
        }
    }

    /// Render as `{ok: 0, errmsg, ...context}`
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("ok".to_string(), Value::Int32(0));
        doc.insert("errmsg".to_string(), Value::String(self.to_string()));

        match self {
            Self::NoConnection { name } | Self::Transient { name } => {
                doc.insert("name".to_string(), Value::from(name.as_str()));
            }
            Self::ConnectFailed { server, name, reason } => {
                doc.insert("server".to_string(), Value::from(server.as_str()));
                doc.insert("name".to_string(), Value::from(name.as_str()));
                doc.insert("reason".to_string(), Value::from(reason.as_str()));
            }
            Self::CursorInterrupted { id } | Self::CursorNotFound(id) => {
                doc.insert("id".to_string(), Value::from(*id));
            }
            Self::Operation { code, command, .. } => {
                if let Some(code) = code {
                    doc.insert("code".to_string(), Value::Int32(*code));
                }
                if let Some(command) = command {
                    doc.insert("cmd".to_string(), Value::from(command.as_str()));
                }
            }
            Self::Parse { .. } | Self::Shape { .. } | Self::Validation(_) => {}
        }

        if self.is_retryable() {
            doc.insert("retry".to_string(), Value::Bool(true));
        }
        doc
    }
}
