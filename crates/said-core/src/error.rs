//! # Error Types: Registry Error Taxonomy
//!
//! Every provider, the fallback orchestrator, and the HTTP surface share
//! this one taxonomy. Providers raise the precise kind; the service layer
//! either resolves an error through its fallback or re-raises it unchanged.
//!
//! ## Absent vs. Error
//!
//! An unknown id on `read`, `exists`, or `delete` is an *absent result*
//! (`None` / `false`), never [`RegistryError::NotFound`]. `NotFound` is
//! reserved for operations that require the record to exist (`update`).

use thiserror::Error;

/// Top-level error type for the schema registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The schema id required by the operation does not exist.
    #[error("schema with id {0} not found")]
    NotFound(String),

    /// A different record already carries this content identifier.
    #[error("schema with SAID {said} already exists")]
    Conflict {
        /// The colliding self-addressing identifier.
        said: String,
    },

    /// Malformed request body, invalid schema structure, or oversized payload.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The durable write to the backing store failed.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A deadline expired before the operation completed.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// The remote registry answered with a non-2xx, non-404 status.
    #[error("HTTP {status}: {body}")]
    RemoteError {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// The request never produced an HTTP response (connection refused,
    /// DNS failure, reset).
    #[error("transport error: {0}")]
    Transport(String),

    /// A payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl RegistryError {
    /// Whether the remote provider's attempt loop may try again after this error.
    ///
    /// Client errors (4xx) and deadline expiry propagate immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RemoteError { status, .. } => !(400..500).contains(status),
            Self::Transport(_) => true,
            _ => false,
        }
    }

    /// Whether this is an HTTP 404 surfaced by the remote registry.
    pub fn is_remote_not_found(&self) -> bool {
        matches!(self, Self::RemoteError { status: 404, .. })
    }

    /// Short machine-readable kind, used in logs and health reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::InvalidInput(_) => "invalid_input",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::Timeout(_) => "timeout",
            Self::RemoteError { .. } => "remote_error",
            Self::Transport(_) => "transport",
            Self::Serialization(_) => "serialization",
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convenience alias used across the registry crates.
pub type Result<T, E = RegistryError> = std::result::Result<T, E>;
