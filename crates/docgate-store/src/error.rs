//! Error types for the docgate-store crate

use thiserror::Error;

/// Result type alias using `StoreError`
pub type Result<T> = std::result::Result<T, StoreError>;

/// Duplicate key error code reported by the store
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// Errors that can occur while talking to a document store
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Endpoint could not be reached when establishing a connection
    #[error("connection error: {0}")]
    Connection(String),

    /// Endpoint URI could not be parsed
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Connectivity lost during an operation; the caller may retry
    #[error("connection lost: {0}")]
    Transient(String),

    /// Store-reported failure, not retryable
    #[error("{message}")]
    Operation { message: String, code: Option<i32> },

    /// Credentials rejected
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Operation timed out
    #[error("operation timed out after {millis}ms")]
    Timeout { millis: u64 },
}

impl StoreError {
    /// Create an operation failure without an error code
    pub fn operation(message: impl Into<String>) -> Self {
        Self::Operation {
            message: message.into(),
            code: None,
        }
    }

    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout { .. })
    }
}
