//! Paged query execution.
//!
//! Pages are requested one at a time, each with the continuation token of
//! the previous page, until the backend stops returning a token. Rows keep
//! the order the backend returned them in; no sorting happens here.

use crate::backend::{ContinuationToken, TableBackend};
use crate::entity::{TableEntity, TableRow};
use crate::error::TableResult;
use crate::provisioner::{self, KnownTables};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::debug;

/// Drains every page of `filter` into memory.
pub(crate) async fn collect_all<T: TableEntity>(
    backend: &dyn TableBackend,
    table: &str,
    filter: &str,
) -> TableResult<Vec<T>> {
    let mut results = Vec::new();
    let mut token: Option<ContinuationToken> = None;
    let mut pages = 0usize;

    loop {
        let segment = backend.query_segment(table, filter, token.as_ref()).await?;
        pages += 1;
        for row in segment.rows {
            results.push(T::from_row(row)?);
        }
        token = segment.continuation;
        if token.is_none() {
            break;
        }
    }

    debug!("Query on {} returned {} rows in {} pages", table, results.len(), pages);
    Ok(results)
}

enum PageState {
    Start,
    Next(ContinuationToken),
    Done,
}

async fn next_page(
    backend: Arc<dyn TableBackend>,
    known: Arc<KnownTables>,
    table: String,
    filter: String,
    state: PageState,
) -> TableResult<Option<(Vec<TableRow>, PageState)>> {
    let token = match state {
        PageState::Done => return Ok(None),
        PageState::Start => {
            provisioner::resolve(backend.as_ref(), &known, &table).await?;
            None
        }
        PageState::Next(token) => Some(token),
    };

    let segment = backend.query_segment(&table, &filter, token.as_ref()).await?;
    let next = match segment.continuation {
        Some(token) => PageState::Next(token),
        None => PageState::Done,
    };
    Ok(Some((segment.rows, next)))
}

/// A lazy stream of pages. Nothing happens until the first poll, which
/// resolves the table and fetches page one; every later page is fetched
/// only when the stream is polled again.
fn pages(
    backend: Arc<dyn TableBackend>,
    known: Arc<KnownTables>,
    table: String,
    filter: String,
) -> BoxStream<'static, TableResult<Vec<TableRow>>> {
    stream::try_unfold(PageState::Start, move |state| {
        next_page(
            Arc::clone(&backend),
            Arc::clone(&known),
            table.clone(),
            filter.clone(),
            state,
        )
    })
    .boxed()
}

/// Flattens [`pages`] into a stream of typed entities. A page is only
/// requested after every row of the previous one has been consumed, and
/// dropping the stream stops all further requests.
pub(crate) fn stream_all<T: TableEntity + 'static>(
    backend: Arc<dyn TableBackend>,
    known: Arc<KnownTables>,
    table: String,
    filter: String,
) -> BoxStream<'static, TableResult<T>> {
    pages(backend, known, table, filter)
        .map_ok(|rows| stream::iter(rows.into_iter().map(T::from_row)))
        .try_flatten()
        .boxed()
}
