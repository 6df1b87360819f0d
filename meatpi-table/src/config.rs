//! Storage account configuration.
//!
//! A [`StorageConfig`] is built once at process start (usually from an Azure
//! connection string) and handed to the client constructor.

use crate::error::{TableError, TableResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Environment variable the web host stores its connection string in.
pub const DEFAULT_CONNECTION_VARIABLE: &str = "AzureWebJobsStorage";

const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_TABLE_ENDPOINT: &str = "http://127.0.0.1:10002/devstoreaccount1";
const DEV_QUEUE_ENDPOINT: &str = "http://127.0.0.1:10001/devstoreaccount1";

/// Connection settings for a table storage account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage account name.
    pub account_name: String,
    /// Base64 account key used for SharedKeyLite signing.
    pub account_key: Option<String>,
    /// Shared access signature query string (without the leading `?`).
    pub sas_token: Option<String>,
    /// Base URL of the table service, without a trailing slash.
    pub table_endpoint: String,
    /// Base URL of the queue service, when the account has one.
    #[serde(default)]
    pub queue_endpoint: Option<String>,
    /// Per-request timeout (in seconds).
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::development()
    }
}

/// How requests are authorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Sign every request with the decoded account key.
    SharedKey { account_name: String, key: Vec<u8> },
    /// Append a shared access signature to every request URL.
    Sas(String),
}

impl StorageConfig {
    /// Settings for the local storage emulator (Azurite).
    pub fn development() -> Self {
        Self {
            account_name: DEV_ACCOUNT_NAME.to_string(),
            account_key: Some(DEV_ACCOUNT_KEY.to_string()),
            sas_token: None,
            table_endpoint: DEV_TABLE_ENDPOINT.to_string(),
            queue_endpoint: Some(DEV_QUEUE_ENDPOINT.to_string()),
            timeout_secs: 60,
        }
    }

    /// Parses an Azure storage connection string.
    ///
    /// Recognised keys: `UseDevelopmentStorage`, `DefaultEndpointsProtocol`,
    /// `AccountName`, `AccountKey`, `SharedAccessSignature`, `TableEndpoint`,
    /// `QueueEndpoint` and `EndpointSuffix`. Keys are case-insensitive; unknown keys (such as
    /// `BlobEndpoint`) are ignored.
    pub fn from_connection_string(connection_string: &str) -> TableResult<Self> {
        let mut protocol = "https".to_string();
        let mut suffix = "core.windows.net".to_string();
        let mut account_name = None;
        let mut account_key = None;
        let mut sas_token = None;
        let mut table_endpoint = None;
        let mut queue_endpoint = None;

        for part in connection_string.split(';').map(str::trim) {
            if part.is_empty() {
                continue;
            }
            let (key, value) = part.split_once('=').ok_or_else(|| {
                TableError::Config(format!("malformed connection string segment: {part}"))
            })?;
            match key.trim().to_ascii_lowercase().as_str() {
                "usedevelopmentstorage" if value.trim().eq_ignore_ascii_case("true") => {
                    return Ok(Self::development());
                }
                "defaultendpointsprotocol" => protocol = value.trim().to_string(),
                "endpointsuffix" => suffix = value.trim().to_string(),
                "accountname" => account_name = Some(value.trim().to_string()),
                "accountkey" => account_key = Some(value.trim().to_string()),
                "sharedaccesssignature" => {
                    sas_token = Some(value.trim().trim_start_matches('?').to_string())
                }
                "tableendpoint" => {
                    table_endpoint = Some(value.trim().trim_end_matches('/').to_string())
                }
                "queueendpoint" => {
                    queue_endpoint = Some(value.trim().trim_end_matches('/').to_string())
                }
                _ => {}
            }
        }

        if let Some(key) = &account_key {
            STANDARD
                .decode(key)
                .map_err(|e| TableError::Config(format!("AccountKey is not valid base64: {e}")))?;
        }

        let table_endpoint = match (table_endpoint, &account_name) {
            (Some(endpoint), _) => endpoint,
            (None, Some(account)) => format!("{protocol}://{account}.table.{suffix}"),
            (None, None) => {
                return Err(TableError::Config(
                    "connection string needs AccountName or TableEndpoint".to_string(),
                ));
            }
        };

        let queue_endpoint = queue_endpoint.or_else(|| {
            account_name
                .as_ref()
                .map(|account| format!("{protocol}://{account}.queue.{suffix}"))
        });

        if account_key.is_some() && account_name.is_none() {
            return Err(TableError::Config(
                "AccountKey given without AccountName".to_string(),
            ));
        }
        if account_key.is_none() && sas_token.is_none() {
            return Err(TableError::Config(
                "connection string needs AccountKey or SharedAccessSignature".to_string(),
            ));
        }

        Ok(Self {
            account_name: account_name.unwrap_or_default(),
            account_key,
            sas_token,
            table_endpoint,
            queue_endpoint,
            timeout_secs: 60,
        })
    }

    /// Reads and parses the connection string stored in `variable`.
    pub fn from_env(variable: &str) -> TableResult<Self> {
        let value = std::env::var(variable)
            .map_err(|_| TableError::Config(format!("environment variable {variable} not set")))?;
        Self::from_connection_string(&value)
    }

    /// Resolves the credentials requests are authorized with. A shared
    /// access signature wins over an account key when both are present.
    pub fn credentials(&self) -> TableResult<Credentials> {
        if let Some(sas) = &self.sas_token {
            return Ok(Credentials::Sas(sas.clone()));
        }
        let key = self
            .account_key
            .as_ref()
            .ok_or_else(|| {
                TableError::Config("no account key or SAS token configured".to_string())
            })?;
        let key = STANDARD
            .decode(key)
            .map_err(|e| TableError::Config(format!("account key is not valid base64: {e}")))?;
        Ok(Credentials::SharedKey {
            account_name: self.account_name.clone(),
            key,
        })
    }
}
