//! Lazy table provisioning.

use crate::backend::TableBackend;
use crate::error::{TableError, TableResult};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Names of tables known to exist.
///
/// Entries are never removed: a table deleted behind the client's back is
/// not detected or recreated.
#[derive(Debug, Default)]
pub struct KnownTables {
    names: RwLock<HashSet<String>>,
}

impl KnownTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, table: &str) -> bool {
        self.names.read().await.contains(table)
    }

    /// Records a table; returns false if it was already known.
    pub async fn insert(&self, table: &str) -> bool {
        self.names.write().await.insert(table.to_string())
    }

    pub async fn len(&self) -> usize {
        self.names.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.names.read().await.is_empty()
    }
}

/// A table that has been confirmed to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHandle {
    name: Arc<str>,
}

impl TableHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Ensures `table` exists, issuing create-if-not-exists only the first time
/// a name is seen.
///
/// Concurrent first calls for one name may each reach the backend; table
/// creation is idempotent there, so that only costs a request.
pub async fn resolve(
    backend: &dyn TableBackend,
    known: &KnownTables,
    table: &str,
) -> TableResult<TableHandle> {
    if table.is_empty() {
        return Err(TableError::invalid_argument("table", "table name is empty"));
    }

    if !known.contains(table).await {
        debug!("Ensuring table {} exists on {}", table, backend.backend_name());
        backend.create_table_if_not_exists(table).await?;
        known.insert(table).await;
    }

    Ok(TableHandle {
        name: Arc::from(table),
    })
}
