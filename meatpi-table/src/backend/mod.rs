//! Storage backend abstraction.
//!
//! The client never talks HTTP directly; it drives a [`TableBackend`],
//! which exposes the handful of primitives the table service offers.
//! [`AzureTableBackend`] is the production implementation.

pub mod azure;

use crate::entity::TableRow;
use crate::error::TableResult;
use async_trait::async_trait;

pub use azure::AzureTableBackend;

/// Maximum number of operations in one entity-group transaction.
pub const MAX_BATCH_SIZE: usize = 100;

/// The kind of a write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteKind {
    /// Create; fails with 409 if the entity exists.
    Insert,
    /// Update the given properties of an existing entity.
    Merge,
    /// Merge, creating the entity if absent. Unconditional.
    InsertOrMerge,
    /// Overwrite, creating the entity if absent. Unconditional.
    InsertOrReplace,
    /// Overwrite an existing entity.
    Replace,
    /// Remove an existing entity.
    Delete,
}

impl WriteKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            WriteKind::Insert => "insert",
            WriteKind::Merge => "merge",
            WriteKind::InsertOrMerge => "insert-or-merge",
            WriteKind::InsertOrReplace => "insert-or-replace",
            WriteKind::Replace => "replace",
            WriteKind::Delete => "delete",
        }
    }

    /// Whether the request carries the entity's token as `If-Match`.
    pub const fn uses_if_match(self) -> bool {
        matches!(self, WriteKind::Merge | WriteKind::Replace | WriteKind::Delete)
    }

    /// Whether the request carries a property payload.
    pub const fn has_body(self) -> bool {
        !matches!(self, WriteKind::Delete)
    }
}

/// One write submitted to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOperation {
    pub kind: WriteKind,
    pub row: TableRow,
}

impl WriteOperation {
    pub fn new(kind: WriteKind, row: TableRow) -> Self {
        Self { kind, row }
    }
}

/// Outcome of one successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    /// HTTP status the service answered with (201, 204, ...).
    pub status: u16,
    /// New concurrency token of the written entity, when reported.
    pub etag: Option<String>,
}

/// Cursor returned by a segmented query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken {
    pub next_partition_key: String,
    pub next_row_key: Option<String>,
}

/// One page of query results.
#[derive(Debug, Clone, Default)]
pub struct QuerySegment {
    pub rows: Vec<TableRow>,
    /// `None` once the result set is exhausted.
    pub continuation: Option<ContinuationToken>,
}

/// Primitives of a table storage service.
#[async_trait]
pub trait TableBackend: Send + Sync {
    /// Returns a short name for logging.
    fn backend_name(&self) -> &'static str;

    /// Creates the table unless it already exists.
    async fn create_table_if_not_exists(&self, table: &str) -> TableResult<()>;

    /// Executes a single write.
    async fn execute(
        &self,
        table: &str,
        operation: WriteOperation,
    ) -> TableResult<OperationResult>;

    /// Executes up to [`MAX_BATCH_SIZE`] same-partition writes atomically.
    /// Results are in submission order.
    async fn execute_batch(
        &self,
        table: &str,
        operations: Vec<WriteOperation>,
    ) -> TableResult<Vec<OperationResult>>;

    /// Fetches one page of rows matching `filter`, resuming at `continuation`.
    async fn query_segment(
        &self,
        table: &str,
        filter: &str,
        continuation: Option<&ContinuationToken>,
    ) -> TableResult<QuerySegment>;

    /// Reads one entity; `None` if it does not exist.
    async fn retrieve(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> TableResult<Option<TableRow>>;
}
