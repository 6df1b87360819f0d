//! Table storage access layer for MeatPi.
//!
//! A thin protocol client over a key-value table service (Azure Table
//! storage in production). It owns no data and caches nothing but the names
//! of tables it has already created.
//!
//! # Components
//!
//! - **Provisioner**: creates a table the first time its name is used
//! - **Conditions**: renders filter predicates and folds them into one
//! - **Queries**: drains continuation tokens, eagerly or as a lazy stream
//! - **Batches**: same-partition writes, chunked to the service limit
//! - **Concurrency guard**: writes without a token become unconditional
//! - **Queue sender**: posts text or JSON messages to a storage queue
//!
//! # Example
//!
//! ```no_run
//! use meatpi_table::{Condition, StorageConfig, TableClient, TableRow};
//!
//! # async fn run() -> meatpi_table::TableResult<()> {
//! let config = StorageConfig::from_env(meatpi_table::DEFAULT_CONNECTION_VARIABLE)?;
//! let client = TableClient::new(config)?;
//!
//! let rows: Vec<TableRow> = client
//!     .query("Cook", [Condition::eq(meatpi_table::PARTITION_KEY, "dev1")])
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod batch;
mod client;
pub mod condition;
mod config;
pub mod entity;
mod error;
pub mod guard;
pub mod keys;
pub mod provisioner;
mod query;
mod queue;

pub use backend::{
    AzureTableBackend, ContinuationToken, MAX_BATCH_SIZE, OperationResult, QuerySegment,
    TableBackend, WriteKind, WriteOperation,
};
pub use client::{QueryStream, TableClient};
pub use condition::{
    ComparisonOp, Condition, LogicalOperator, QueryOperator, StringOp, combine, combine_filters,
};
pub use config::{Credentials, DEFAULT_CONNECTION_VARIABLE, StorageConfig};
pub use entity::{
    EdmValue, HasConcurrencyToken, HasPartitionKey, HasRowKey, PARTITION_KEY, Properties, ROW_KEY,
    TIMESTAMP, TableEntity, TableRow, WILDCARD_ETAG,
};
pub use error::{TableError, TableResult};
pub use guard::{ensure_token, ensure_tokens};
pub use provisioner::{KnownTables, TableHandle};
pub use queue::{QUEUE_CONNECTION_VARIABLE, QueueClient};
