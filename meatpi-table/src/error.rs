//! Error types for the table storage layer.

use thiserror::Error;

/// Result type for table operations.
pub type TableResult<T> = Result<T, TableError>;

/// Errors that can occur in table operations.
#[derive(Debug, Error)]
pub enum TableError {
    /// A required input was missing or inconsistent. Always raised before
    /// any request reaches the backend.
    #[error("invalid argument `{argument}`: {reason}")]
    InvalidArgument {
        argument: &'static str,
        reason: String,
    },

    /// The storage service answered with an error status.
    #[error("backend returned {status}: {message}")]
    Backend {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Transport-level failure talking to the storage service.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A row or response payload could not be interpreted.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Invalid or missing storage configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TableError {
    pub(crate) fn invalid_argument(argument: &'static str, reason: impl Into<String>) -> Self {
        TableError::InvalidArgument {
            argument,
            reason: reason.into(),
        }
    }

    /// Returns true for errors detected locally before any network call.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, TableError::InvalidArgument { .. })
    }

    /// Returns true for errors reported by, or on the way to, the backend.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, TableError::Backend { .. } | TableError::Http(_))
    }

    /// HTTP status of the failure, if the backend produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            TableError::Backend { status, .. } => Some(*status),
            TableError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns true if the service is throttling (429 or 503 "server busy").
    pub fn is_throttled(&self) -> bool {
        matches!(self.status(), Some(429) | Some(503))
    }

    /// Returns true for 409 responses (entity or table already exists).
    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    /// Returns true when an `If-Match` concurrency token did not match.
    pub fn is_precondition_failed(&self) -> bool {
        self.status() == Some(412)
    }
}
