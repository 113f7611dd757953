//! Error taxonomy for SmartRecover.
//!
//! Every crate in the workspace reports failures through [`Error`]. The
//! variants map one-to-one onto the HTTP statuses the API surface exposes;
//! the mapping itself lives in the API crate.

use thiserror::Error;

/// Result type alias used throughout SmartRecover.
pub type Result<T> = std::result::Result<T, Error>;

/// SmartRecover error kinds.
#[derive(Debug, Error)]
pub enum Error {
    /// A requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request violated the schema or carried a bad enum value.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An illegal state transition was requested.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A connector or LLM backend failed.
    #[error("upstream failure: {0}")]
    Upstream(String),

    /// The operation is not supported by the selected backend.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The client went away mid-operation.
    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::Conflict(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Error::Upstream(msg.into())
    }

    pub fn not_supported(msg: impl Into<String>) -> Self {
        Error::NotSupported(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Error::Cancelled(msg.into())
    }

    /// Whether a retry might succeed (network timeouts, 5xx responses).
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Upstream(_))
    }
}
