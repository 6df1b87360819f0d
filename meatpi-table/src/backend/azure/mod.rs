//! Azure Table storage backend.
//!
//! Talks to the Table service REST API (version 2019-02-02) with JSON
//! payloads. Requests are signed with SharedKeyLite, or authorized by a
//! shared access signature appended to the URL.

pub(crate) mod auth;
mod batch;
mod payload;

use super::{
    ContinuationToken, MAX_BATCH_SIZE, OperationResult, QuerySegment, TableBackend, WriteKind,
    WriteOperation,
};
use crate::config::{Credentials, StorageConfig};
use crate::entity::{TableRow, WILDCARD_ETAG};
use crate::error::{TableError, TableResult};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{ACCEPT, CONTENT_TYPE, ETAG, IF_MATCH};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const API_VERSION: &str = "2019-02-02";
const DATA_SERVICE_VERSION: &str = "3.0;NetFx";
const ACCEPT_JSON: &str = "application/json;odata=minimalmetadata";
const NEXT_PARTITION_KEY_HEADER: &str = "x-ms-continuation-NextPartitionKey";
const NEXT_ROW_KEY_HEADER: &str = "x-ms-continuation-NextRowKey";
const ERROR_CODE_HEADER: &str = "x-ms-error-code";

/// Body of a query response.
#[derive(Debug, Deserialize)]
struct QueryResponse {
    value: Vec<serde_json::Value>,
}

/// Azure Table storage implementation of [`TableBackend`].
pub struct AzureTableBackend {
    config: StorageConfig,
    credentials: Credentials,
    client: Client,
}

impl AzureTableBackend {
    /// Creates a backend for the configured account.
    pub fn new(config: StorageConfig) -> TableResult<Self> {
        let credentials = config.credentials()?;
        Url::parse(&config.table_endpoint).map_err(|e| {
            TableError::Config(format!("bad table endpoint {}: {e}", config.table_endpoint))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            credentials,
            client,
        })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Builds `{endpoint}/{path}?{query}`, percent-encoding query values
    /// (spaces as `%20`, which the service requires inside `$filter`).
    fn url(&self, path: &str, query: &[(&str, &str)]) -> TableResult<Url> {
        let mut url = Url::parse(&format!("{}/{}", self.config.table_endpoint, path))
            .map_err(|e| {
                TableError::invalid_argument("table", format!("unusable URL path {path}: {e}"))
            })?;

        let mut pairs: Vec<String> = query
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        if let Credentials::Sas(sas) = &self.credentials {
            pairs.push(sas.clone());
        }
        if !pairs.is_empty() {
            url.set_query(Some(&pairs.join("&")));
        }
        Ok(url)
    }

    /// Starts a request with the protocol and authorization headers set.
    fn request(&self, method: Method, url: Url) -> TableResult<RequestBuilder> {
        let date = auth::request_date(Utc::now());
        let mut builder = self
            .client
            .request(method, url.clone())
            .header("x-ms-date", &date)
            .header("x-ms-version", API_VERSION)
            .header("DataServiceVersion", DATA_SERVICE_VERSION)
            .header("MaxDataServiceVersion", DATA_SERVICE_VERSION)
            .header(ACCEPT, ACCEPT_JSON);

        if let Credentials::SharedKey { account_name, key } = &self.credentials {
            let authorization = auth::shared_key_lite(account_name, key, &date, &url)?;
            builder = builder.header("Authorization", authorization);
        }
        Ok(builder)
    }

    fn write_request(
        &self,
        table: &str,
        operation: &WriteOperation,
    ) -> TableResult<RequestBuilder> {
        let row = &operation.row;
        let builder = match operation.kind {
            WriteKind::Insert => self.request(Method::POST, self.url(table, &[])?)?,
            kind => {
                let method = match kind {
                    WriteKind::Merge | WriteKind::InsertOrMerge => merge_method()?,
                    WriteKind::Replace | WriteKind::InsertOrReplace => Method::PUT,
                    _ => Method::DELETE,
                };
                let url = self.url(&entity_path(table, &row.partition_key, &row.row_key), &[])?;
                self.request(method, url)?
            }
        };

        let builder = if operation.kind.uses_if_match() {
            builder.header(IF_MATCH, row.etag.as_deref().unwrap_or(WILDCARD_ETAG))
        } else {
            builder
        };

        Ok(if operation.kind.has_body() {
            builder
                .header("Prefer", "return-no-content")
                .json(&payload::row_to_json(row))
        } else {
            builder
        })
    }
}

#[async_trait]
impl TableBackend for AzureTableBackend {
    fn backend_name(&self) -> &'static str {
        "Azure Table storage"
    }

    async fn create_table_if_not_exists(&self, table: &str) -> TableResult<()> {
        let response = self
            .request(Method::POST, self.url("Tables", &[])?)?
            .header("Prefer", "return-no-content")
            .json(&serde_json::json!({ "TableName": table }))
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            debug!("Table {} already exists", table);
            return Ok(());
        }
        check(response).await?;
        info!("Created table {}", table);
        Ok(())
    }

    async fn execute(
        &self,
        table: &str,
        operation: WriteOperation,
    ) -> TableResult<OperationResult> {
        debug!(
            "{} {}/{} in {}",
            operation.kind.as_str(),
            operation.row.partition_key,
            operation.row.row_key,
            table
        );

        let response = check(self.write_request(table, &operation)?.send().await?).await?;
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(OperationResult {
            status: response.status().as_u16(),
            etag,
        })
    }

    async fn execute_batch(
        &self,
        table: &str,
        operations: Vec<WriteOperation>,
    ) -> TableResult<Vec<OperationResult>> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }
        if operations.len() > MAX_BATCH_SIZE {
            return Err(TableError::invalid_argument(
                "operations",
                format!(
                    "{} operations exceed the batch limit of {MAX_BATCH_SIZE}",
                    operations.len()
                ),
            ));
        }

        let batch_id = uuid::Uuid::new_v4().to_string();
        let changeset_id = uuid::Uuid::new_v4().to_string();
        let body = batch::build_batch_body(
            &self.config.table_endpoint,
            table,
            &operations,
            &batch_id,
            &changeset_id,
        );

        debug!("Submitting batch of {} operations to {}", operations.len(), table);

        let response = self
            .request(Method::POST, self.url("$batch", &[])?)?
            .header(CONTENT_TYPE, body.content_type)
            .body(body.body)
            .send()
            .await?;
        let text = check(response).await?.text().await?;

        batch::parse_batch_response(&text, operations.len())
    }

    async fn query_segment(
        &self,
        table: &str,
        filter: &str,
        continuation: Option<&ContinuationToken>,
    ) -> TableResult<QuerySegment> {
        let mut query = vec![("$filter", filter)];
        if let Some(token) = continuation {
            query.push(("NextPartitionKey", token.next_partition_key.as_str()));
            if let Some(row_key) = &token.next_row_key {
                query.push(("NextRowKey", row_key.as_str()));
            }
        }

        let url = self.url(&format!("{table}()"), &query)?;
        let response = check(self.request(Method::GET, url)?.send().await?).await?;

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let continuation = header(NEXT_PARTITION_KEY_HEADER).map(|next_partition_key| {
            ContinuationToken {
                next_partition_key,
                next_row_key: header(NEXT_ROW_KEY_HEADER),
            }
        });

        let body: QueryResponse = response.json().await?;
        let rows = body
            .value
            .into_iter()
            .map(payload::row_from_json)
            .collect::<TableResult<Vec<_>>>()?;

        debug!(
            "Fetched {} rows from {} (more: {})",
            rows.len(),
            table,
            continuation.is_some()
        );
        Ok(QuerySegment { rows, continuation })
    }

    async fn retrieve(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> TableResult<Option<TableRow>> {
        let url = self.url(&entity_path(table, partition_key, row_key), &[])?;
        let response = self.request(Method::GET, url)?.send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: serde_json::Value = check(response).await?.json().await?;
        payload::row_from_json(body).map(Some)
    }
}

/// `Table(PartitionKey='pk',RowKey='rk')`, with quotes doubled and key
/// characters percent-encoded.
pub(crate) fn entity_path(table: &str, partition_key: &str, row_key: &str) -> String {
    let key = |k: &str| urlencoding::encode(&k.replace('\'', "''")).into_owned();
    format!(
        "{}(PartitionKey='{}',RowKey='{}')",
        table,
        key(partition_key),
        key(row_key)
    )
}

fn merge_method() -> TableResult<Method> {
    Method::from_bytes(b"MERGE").map_err(|e| TableError::InvalidData(format!("MERGE verb: {e}")))
}

/// Passes successful responses through and turns the rest into
/// [`TableError::Backend`].
pub(crate) async fn check(response: Response) -> TableResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let code = response
        .headers()
        .get(ERROR_CODE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let text = response.text().await.unwrap_or_default();
    Err(error_from_body(status, code, &text))
}

/// Builds a backend error from an OData error payload, falling back to the
/// raw body when it is not one.
pub(crate) fn error_from_body(status: u16, code: Option<String>, body: &str) -> TableError {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body.trim()).ok();
    let error = parsed.as_ref().and_then(|v| v.get("odata.error"));

    let code = code.or_else(|| {
        error
            .and_then(|e| e.get("code"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
    });
    let message = error
        .and_then(|e| e.pointer("/message/value"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("unknown error")
                    .to_string()
            } else {
                trimmed.to_string()
            }
        });

    TableError::Backend {
        status,
        code,
        message,
    }
}
