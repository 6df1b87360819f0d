//! The table client.

use crate::backend::{AzureTableBackend, OperationResult, TableBackend, WriteKind, WriteOperation};
use crate::batch;
use crate::condition::{self, Condition, LogicalOperator};
use crate::config::StorageConfig;
use crate::entity::{HasConcurrencyToken, TableEntity};
use crate::error::{TableError, TableResult};
use crate::guard::{ensure_token, ensure_tokens};
use crate::provisioner::{self, KnownTables, TableHandle};
use crate::query;
use futures::stream::BoxStream;
use std::sync::Arc;

/// A lazy, single-pass stream of query results.
pub type QueryStream<T> = BoxStream<'static, TableResult<T>>;

/// Client for one storage account.
///
/// Cloning is cheap; clones share the backend and the set of tables known
/// to exist.
#[derive(Clone)]
pub struct TableClient {
    backend: Arc<dyn TableBackend>,
    known_tables: Arc<KnownTables>,
}

impl TableClient {
    /// Creates a client talking to Azure Table storage.
    pub fn new(config: StorageConfig) -> TableResult<Self> {
        Ok(Self::with_backend(Arc::new(AzureTableBackend::new(config)?)))
    }

    /// Creates a client over any backend, with an empty table registry.
    pub fn with_backend(backend: Arc<dyn TableBackend>) -> Self {
        Self::with_known_tables(backend, Arc::new(KnownTables::new()))
    }

    /// Creates a client that shares a table registry with other clients.
    pub fn with_known_tables(
        backend: Arc<dyn TableBackend>,
        known_tables: Arc<KnownTables>,
    ) -> Self {
        Self {
            backend,
            known_tables,
        }
    }

    pub fn known_tables(&self) -> &KnownTables {
        &self.known_tables
    }

    /// Ensures `table` exists and returns a handle to it. Only the first call
    /// for a name reaches the backend.
    pub async fn table(&self, table: &str) -> TableResult<TableHandle> {
        provisioner::resolve(self.backend.as_ref(), &self.known_tables, table).await
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Runs a query whose conditions are joined with `and`, collecting every
    /// page before returning.
    pub async fn query<T, I>(&self, table: &str, conditions: I) -> TableResult<Vec<T>>
    where
        T: TableEntity,
        I: IntoIterator,
        I::Item: Into<Condition>,
    {
        self.query_with(table, conditions, LogicalOperator::And).await
    }

    /// Like [`TableClient::query`], joining conditions with `operator`.
    pub async fn query_with<T, I>(
        &self,
        table: &str,
        conditions: I,
        operator: LogicalOperator,
    ) -> TableResult<Vec<T>>
    where
        T: TableEntity,
        I: IntoIterator,
        I::Item: Into<Condition>,
    {
        let filter = aggregate(conditions, operator)?;
        let handle = self.table(table).await?;
        query::collect_all(self.backend.as_ref(), handle.name(), filter.as_str()).await
    }

    /// Streams a query whose conditions are joined with `and`.
    ///
    /// Fails immediately if there are no conditions. Otherwise nothing is
    /// sent until the stream is polled.
    pub fn query_stream<T, I>(&self, table: &str, conditions: I) -> TableResult<QueryStream<T>>
    where
        T: TableEntity + 'static,
        I: IntoIterator,
        I::Item: Into<Condition>,
    {
        self.query_stream_with(table, conditions, LogicalOperator::And)
    }

    /// Like [`TableClient::query_stream`], joining conditions with `operator`.
    pub fn query_stream_with<T, I>(
        &self,
        table: &str,
        conditions: I,
        operator: LogicalOperator,
    ) -> TableResult<QueryStream<T>>
    where
        T: TableEntity + 'static,
        I: IntoIterator,
        I::Item: Into<Condition>,
    {
        let filter = aggregate(conditions, operator)?;
        if table.is_empty() {
            return Err(TableError::invalid_argument("table", "table name is empty"));
        }
        Ok(query::stream_all(
            Arc::clone(&self.backend),
            Arc::clone(&self.known_tables),
            table.to_string(),
            filter.into_string(),
        ))
    }

    /// Reads one entity by key; `None` if it does not exist.
    pub async fn get<T: TableEntity>(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> TableResult<Option<T>> {
        let handle = self.table(table).await?;
        self.backend
            .retrieve(handle.name(), partition_key, row_key)
            .await?
            .map(T::from_row)
            .transpose()
    }

    // ── Single-entity writes ────────────────────────────────────────

    pub async fn insert<T: TableEntity>(
        &self,
        table: &str,
        entity: &mut T,
    ) -> TableResult<OperationResult> {
        self.execute(table, entity, WriteKind::Insert).await
    }

    pub async fn merge<T: TableEntity>(
        &self,
        table: &str,
        entity: &mut T,
    ) -> TableResult<OperationResult> {
        self.execute(table, entity, WriteKind::Merge).await
    }

    pub async fn insert_or_merge<T: TableEntity>(
        &self,
        table: &str,
        entity: &mut T,
    ) -> TableResult<OperationResult> {
        self.execute(table, entity, WriteKind::InsertOrMerge).await
    }

    pub async fn insert_or_replace<T: TableEntity>(
        &self,
        table: &str,
        entity: &mut T,
    ) -> TableResult<OperationResult> {
        self.execute(table, entity, WriteKind::InsertOrReplace).await
    }

    pub async fn replace<T: TableEntity>(
        &self,
        table: &str,
        entity: &mut T,
    ) -> TableResult<OperationResult> {
        self.execute(table, entity, WriteKind::Replace).await
    }

    pub async fn delete<T: TableEntity>(
        &self,
        table: &str,
        entity: &mut T,
    ) -> TableResult<OperationResult> {
        self.execute(table, entity, WriteKind::Delete).await
    }

    /// Executes one write of `kind`. An entity without a concurrency token
    /// gets the wildcard token first, making the write unconditional.
    pub async fn execute<T: TableEntity>(
        &self,
        table: &str,
        entity: &mut T,
        kind: WriteKind,
    ) -> TableResult<OperationResult> {
        ensure_token(entity);
        let handle = self.table(table).await?;
        let result = self
            .backend
            .execute(handle.name(), WriteOperation::new(kind, entity.to_row()))
            .await?;
        adopt_etag(entity, kind, &result);
        Ok(result)
    }

    // ── Batched writes ──────────────────────────────────────────────

    /// Inserts entities in batches of 100; all must share a partition key.
    pub async fn insert_batch<T: TableEntity>(
        &self,
        table: &str,
        entities: &mut [T],
    ) -> TableResult<Vec<OperationResult>> {
        self.apply_batch(table, entities, WriteKind::Insert).await
    }

    /// Inserts or merges entities in batches of 100; all must share a
    /// partition key.
    pub async fn insert_or_merge_batch<T: TableEntity>(
        &self,
        table: &str,
        entities: &mut [T],
    ) -> TableResult<Vec<OperationResult>> {
        self.apply_batch(table, entities, WriteKind::InsertOrMerge).await
    }

    /// Inserts or replaces entities in batches of 100; all must share a
    /// partition key.
    pub async fn insert_or_replace_batch<T: TableEntity>(
        &self,
        table: &str,
        entities: &mut [T],
    ) -> TableResult<Vec<OperationResult>> {
        self.apply_batch(table, entities, WriteKind::InsertOrReplace).await
    }

    /// Deletes entities in batches of 100; all must share a partition key.
    pub async fn delete_batch<T: TableEntity>(
        &self,
        table: &str,
        entities: &mut [T],
    ) -> TableResult<Vec<OperationResult>> {
        self.apply_batch(table, entities, WriteKind::Delete).await
    }

    /// Applies `kind` to every entity, returning one result per entity in
    /// submission order.
    ///
    /// Mixed partition keys are rejected before anything is sent. Chunks are
    /// committed one by one, so a failure leaves earlier chunks in place and
    /// only the failing chunk's error is returned.
    pub async fn apply_batch<T: TableEntity>(
        &self,
        table: &str,
        entities: &mut [T],
        kind: WriteKind,
    ) -> TableResult<Vec<OperationResult>> {
        ensure_tokens(entities);
        batch::validate_partition(entities)?;
        if entities.is_empty() {
            return Ok(Vec::new());
        }

        let handle = self.table(table).await?;
        let operations = entities
            .iter()
            .map(|e| WriteOperation::new(kind, e.to_row()))
            .collect();
        let results = batch::submit_chunks(self.backend.as_ref(), handle.name(), operations).await?;

        for (entity, result) in entities.iter_mut().zip(&results) {
            adopt_etag(entity, kind, result);
        }
        Ok(results)
    }
}

impl std::fmt::Debug for TableClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableClient")
            .field("backend", &self.backend.backend_name())
            .finish_non_exhaustive()
    }
}

fn aggregate<I>(conditions: I, operator: LogicalOperator) -> TableResult<Condition>
where
    I: IntoIterator,
    I::Item: Into<Condition>,
{
    condition::combine(operator, conditions).ok_or_else(|| {
        TableError::invalid_argument("conditions", "query must have at least one condition")
    })
}

/// Stores the token the backend reported for a written entity.
fn adopt_etag<E: HasConcurrencyToken + ?Sized>(
    entity: &mut E,
    kind: WriteKind,
    result: &OperationResult,
) {
    if kind == WriteKind::Delete {
        return;
    }
    if let Some(etag) = &result.etag {
        entity.set_etag(Some(etag.clone()));
    }
}
