//! Queue message sender.
//!
//! Posts text messages to an Azure Storage queue of the same account the
//! tables live in. Messages are sent as plain text; the queue must already
//! exist.

use crate::backend::azure::{auth, check};
use crate::config::{Credentials, StorageConfig};
use crate::error::{TableError, TableResult};
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Url};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Environment variable the web host stores the queue connection string in.
pub const QUEUE_CONNECTION_VARIABLE: &str = "StorageConnectionString";

const API_VERSION: &str = "2019-02-02";
const CONTENT_TYPE_XML: &str = "application/xml";

/// Sends messages to the queues of one storage account.
pub struct QueueClient {
    endpoint: String,
    account_name: String,
    credentials: Credentials,
    client: Client,
}

impl QueueClient {
    /// Creates a sender for the configured account's queue service.
    pub fn new(config: StorageConfig) -> TableResult<Self> {
        let credentials = config.credentials()?;
        let endpoint = config
            .queue_endpoint
            .clone()
            .ok_or_else(|| TableError::Config("no queue endpoint configured".to_string()))?;
        Url::parse(&endpoint)
            .map_err(|e| TableError::Config(format!("bad queue endpoint {endpoint}: {e}")))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            endpoint,
            account_name: config.account_name,
            credentials,
            client,
        })
    }

    /// Posts `message` to `queue`.
    pub async fn send(&self, queue: &str, message: &str) -> TableResult<()> {
        if queue.is_empty() {
            return Err(TableError::invalid_argument("queue", "queue name is empty"));
        }
        if message.is_empty() {
            return Err(TableError::invalid_argument("message", "message body is empty"));
        }

        let url = self.url(queue)?;
        let date = auth::request_date(Utc::now());
        let mut request = self
            .client
            .request(Method::POST, url.clone())
            .header("x-ms-date", &date)
            .header("x-ms-version", API_VERSION)
            .header(CONTENT_TYPE, CONTENT_TYPE_XML);

        if let Credentials::SharedKey { key, .. } = &self.credentials {
            let authorization = auth::shared_key_lite_queue(
                &self.account_name,
                key,
                Method::POST.as_str(),
                CONTENT_TYPE_XML,
                &[("x-ms-date", date.as_str()), ("x-ms-version", API_VERSION)],
                &url,
            )?;
            request = request.header("Authorization", authorization);
        }

        check(request.body(message_body(message)).send().await?).await?;
        debug!("Queued {} byte message on {}", message.len(), queue);
        Ok(())
    }

    /// Serializes `message` to JSON and posts it to `queue`.
    pub async fn send_json<T: Serialize + ?Sized>(
        &self,
        queue: &str,
        message: &T,
    ) -> TableResult<()> {
        let json = serde_json::to_string(message)?;
        if json == "null" {
            return Err(TableError::invalid_argument("message", "message is null"));
        }
        self.send(queue, &json).await
    }

    fn url(&self, queue: &str) -> TableResult<Url> {
        let mut url = Url::parse(&format!(
            "{}/{}/messages",
            self.endpoint,
            urlencoding::encode(queue)
        ))
        .map_err(|e| {
            TableError::invalid_argument("queue", format!("unusable queue name {queue}: {e}"))
        })?;
        if let Credentials::Sas(sas) = &self.credentials {
            url.set_query(Some(sas));
        }
        Ok(url)
    }
}

impl std::fmt::Debug for QueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// `<QueueMessage>` envelope with the text XML-escaped.
fn message_body(message: &str) -> String {
    let mut escaped = String::with_capacity(message.len());
    for c in message.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?><QueueMessage><MessageText>{escaped}</MessageText></QueueMessage>"
    )
}
