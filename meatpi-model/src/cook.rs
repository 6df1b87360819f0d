use chrono::{DateTime, Utc};
use meatpi_table::{
    Condition, HasConcurrencyToken, HasPartitionKey, HasRowKey, PARTITION_KEY, Properties,
    TIMESTAMP, TableEntity, TableResult, TableRow,
};
use serde::{Deserialize, Serialize};

/// Name of the table holding one row per cook.
pub const TABLE_NAME: &str = "Cook";

const START_TIME: &str = "StartTime";
const LAST_TIME: &str = "LastTime";

/// A cook session run by one smoker device.
///
/// Keyed by device id (partition) and cook id (row). The device reports its
/// own start and last-reading times as opaque strings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CookEntity {
    pub device_id: String,
    pub cook_id: String,
    pub start_time: String,
    pub last_time: String,
    #[serde(skip)]
    pub etag: Option<String>,
}

impl CookEntity {
    pub fn new(device_id: impl Into<String>, cook_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            cook_id: cook_id.into(),
            ..Default::default()
        }
    }
}

impl HasPartitionKey for CookEntity {
    fn partition_key(&self) -> &str {
        &self.device_id
    }
}

impl HasRowKey for CookEntity {
    fn row_key(&self) -> &str {
        &self.cook_id
    }
}

impl HasConcurrencyToken for CookEntity {
    fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    fn set_etag(&mut self, etag: Option<String>) {
        self.etag = etag;
    }
}

impl TableEntity for CookEntity {
    fn properties(&self) -> Properties {
        let mut properties = Properties::new();
        properties.insert(START_TIME.to_string(), self.start_time.clone().into());
        properties.insert(LAST_TIME.to_string(), self.last_time.clone().into());
        properties
    }

    fn from_row(row: TableRow) -> TableResult<Self> {
        // Older rows may predate either time column.
        let text = |name: &str| row.get_str(name).unwrap_or_default().to_string();
        Ok(Self {
            start_time: text(START_TIME),
            last_time: text(LAST_TIME),
            device_id: row.partition_key,
            cook_id: row.row_key,
            etag: row.etag,
        })
    }
}

/// Cooks whose row changed after `since`.
pub fn cooks_since(since: DateTime<Utc>) -> Condition {
    Condition::gt(TIMESTAMP, since)
}

/// Every cook of one device.
pub fn cooks_for_device(device_id: &str) -> Condition {
    Condition::eq(PARTITION_KEY, device_id)
}
