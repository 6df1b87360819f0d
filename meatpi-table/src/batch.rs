//! Batched writes.
//!
//! Entity-group transactions must stay within one partition and hold at
//! most [`MAX_BATCH_SIZE`] operations, so larger inputs are split into
//! consecutive chunks that are submitted one after another. A failing chunk
//! does not roll back the chunks before it.

use crate::backend::{MAX_BATCH_SIZE, OperationResult, TableBackend, WriteOperation};
use crate::entity::HasPartitionKey;
use crate::error::{TableError, TableResult};
use tracing::{debug, warn};

/// Checks that every entity shares the first entity's partition key.
pub fn validate_partition<E: HasPartitionKey>(entities: &[E]) -> TableResult<()> {
    let Some(first) = entities.first() else {
        return Ok(());
    };
    let key = first.partition_key();
    if let Some(stray) = entities.iter().find(|e| e.partition_key() != key) {
        return Err(TableError::invalid_argument(
            "entities",
            format!(
                "not all entities have the same partition key ({key:?} vs {:?})",
                stray.partition_key()
            ),
        ));
    }
    Ok(())
}

/// Sizes of the chunks `len` operations are split into.
pub fn chunk_sizes(len: usize) -> Vec<usize> {
    (0..len)
        .step_by(MAX_BATCH_SIZE)
        .map(|start| (len - start).min(MAX_BATCH_SIZE))
        .collect()
}

/// Submits `operations` in order, [`MAX_BATCH_SIZE`] at a time, and
/// concatenates the per-chunk results.
pub(crate) async fn submit_chunks(
    backend: &dyn TableBackend,
    table: &str,
    operations: Vec<WriteOperation>,
) -> TableResult<Vec<OperationResult>> {
    let total = operations.len();
    let mut results = Vec::with_capacity(total);
    let mut remaining = operations.into_iter();
    let mut chunk_index = 0usize;

    loop {
        let chunk: Vec<WriteOperation> = remaining.by_ref().take(MAX_BATCH_SIZE).collect();
        if chunk.is_empty() {
            break;
        }
        let size = chunk.len();
        match backend.execute_batch(table, chunk).await {
            Ok(chunk_results) => results.extend(chunk_results),
            Err(e) => {
                warn!(
                    "Batch chunk {} on {} failed after {} of {} operations committed: {}",
                    chunk_index,
                    table,
                    results.len(),
                    total,
                    e
                );
                return Err(e);
            }
        }
        debug!("Committed chunk {} ({} operations) on {}", chunk_index, size, table);
        chunk_index += 1;
    }

    Ok(results)
}
