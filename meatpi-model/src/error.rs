//! Model error types.

use meatpi_table::TableError;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while loading or interpreting MeatPi entities.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("table error: {0}")]
    Table(#[from] TableError),

    #[error("probe readings are not valid JSON: {0}")]
    Readings(#[from] serde_json::Error),

    #[error("no probe reading on pin {0}")]
    MissingProbe(i32),
}

impl ModelError {
    /// Returns true if the error came from the storage service or transport.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, ModelError::Table(e) if e.is_backend_failure())
    }
}
