//! Scripted in-process backend shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use meatpi_table::{
    ContinuationToken, OperationResult, QuerySegment, TableBackend, TableError, TableResult,
    TableRow, WriteKind, WriteOperation,
};
use std::collections::HashMap;
use std::sync::Mutex;

/// A backend call, as recorded by [`ScriptedBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateTable(String),
    Execute { table: String, kind: WriteKind, row: TableRow },
    Batch { table: String, rows: Vec<TableRow> },
    Query { table: String, filter: String, token: Option<ContinuationToken> },
    Retrieve { table: String, partition_key: String, row_key: String },
}

/// Serves canned query pages and stored rows, recording every call.
///
/// Page `n` is requested with a continuation token whose partition key is
/// `"page-n"`; the last page returns no token.
#[derive(Default)]
pub struct ScriptedBackend {
    pages: Vec<Vec<TableRow>>,
    stored: HashMap<(String, String), TableRow>,
    fail_batch_number: Option<usize>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(mut self, pages: Vec<Vec<TableRow>>) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_stored(mut self, row: TableRow) -> Self {
        self.stored
            .insert((row.partition_key.clone(), row.row_key.clone()), row);
        self
    }

    /// Makes the `n`-th batch call (zero-based) fail with a 409.
    pub fn failing_batch(mut self, n: usize) -> Self {
        self.fail_batch_number = Some(n);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn creates(&self) -> usize {
        self.count(|c| matches!(c, Call::CreateTable(_)))
    }

    pub fn queries(&self) -> usize {
        self.count(|c| matches!(c, Call::Query { .. }))
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Batch { rows, .. } => Some(rows.len()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

/// ETag the scripted backend hands out for a written row.
pub fn etag_for(row_key: &str) -> String {
    format!("W/\"{row_key}\"")
}

#[async_trait]
impl TableBackend for ScriptedBackend {
    fn backend_name(&self) -> &'static str {
        "scripted"
    }

    async fn create_table_if_not_exists(&self, table: &str) -> TableResult<()> {
        self.record(Call::CreateTable(table.to_string()));
        Ok(())
    }

    async fn execute(
        &self,
        table: &str,
        operation: WriteOperation,
    ) -> TableResult<OperationResult> {
        let etag = (operation.kind != WriteKind::Delete).then(|| etag_for(&operation.row.row_key));
        self.record(Call::Execute {
            table: table.to_string(),
            kind: operation.kind,
            row: operation.row,
        });
        Ok(OperationResult { status: 204, etag })
    }

    async fn execute_batch(
        &self,
        table: &str,
        operations: Vec<WriteOperation>,
    ) -> TableResult<Vec<OperationResult>> {
        let batch_number = self.count(|c| matches!(c, Call::Batch { .. }));
        let rows: Vec<TableRow> = operations.into_iter().map(|op| op.row).collect();
        let results = rows
            .iter()
            .map(|row| OperationResult {
                status: 204,
                etag: Some(etag_for(&row.row_key)),
            })
            .collect();
        self.record(Call::Batch {
            table: table.to_string(),
            rows,
        });

        if self.fail_batch_number == Some(batch_number) {
            return Err(TableError::Backend {
                status: 409,
                code: Some("EntityAlreadyExists".to_string()),
                message: "0:The specified entity already exists.".to_string(),
            });
        }
        Ok(results)
    }

    async fn query_segment(
        &self,
        table: &str,
        filter: &str,
        continuation: Option<&ContinuationToken>,
    ) -> TableResult<QuerySegment> {
        self.record(Call::Query {
            table: table.to_string(),
            filter: filter.to_string(),
            token: continuation.cloned(),
        });

        let index = match continuation {
            None => 0,
            Some(token) => token
                .next_partition_key
                .strip_prefix("page-")
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| TableError::InvalidData("unknown token".to_string()))?,
        };
        let rows = self.pages.get(index).cloned().unwrap_or_default();
        let continuation = (index + 1 < self.pages.len()).then(|| ContinuationToken {
            next_partition_key: format!("page-{}", index + 1),
            next_row_key: None,
        });
        Ok(QuerySegment { rows, continuation })
    }

    async fn retrieve(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> TableResult<Option<TableRow>> {
        self.record(Call::Retrieve {
            table: table.to_string(),
            partition_key: partition_key.to_string(),
            row_key: row_key.to_string(),
        });
        Ok(self
            .stored
            .get(&(partition_key.to_string(), row_key.to_string()))
            .cloned())
    }
}

/// `count` rows in partition `pk`, row keys zero-padded so they sort.
pub fn rows(pk: &str, count: usize) -> Vec<TableRow> {
    (0..count)
        .map(|i| TableRow::new(pk, format!("{i:04}")).with("Value", i as i32))
        .collect()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
