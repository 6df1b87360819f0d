//! Typed entity contract.
//!
//! Every record stored in a table has a composite key (partition key + row
//! key), an optional concurrency token (ETag) and a bag of typed properties.
//! Concrete entity types opt in through the capability traits below instead
//! of inheriting from a base type; [`TableRow`] is the generic key-value
//! record that flows across the backend boundary.

use crate::error::{TableError, TableResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Name of the partition key system property.
pub const PARTITION_KEY: &str = "PartitionKey";
/// Name of the row key system property.
pub const ROW_KEY: &str = "RowKey";
/// Name of the server-maintained last-modified system property.
pub const TIMESTAMP: &str = "Timestamp";

/// Concurrency token that makes a write unconditional.
pub const WILDCARD_ETAG: &str = "*";

/// A typed property value (the EDM types understood by table storage).
#[derive(Debug, Clone, PartialEq)]
pub enum EdmValue {
    String(String),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Guid(Uuid),
    Binary(Vec<u8>),
}

impl EdmValue {
    /// The EDM type name, as used in `@odata.type` annotations.
    pub fn edm_type(&self) -> &'static str {
        match self {
            EdmValue::String(_) => "Edm.String",
            EdmValue::Int32(_) => "Edm.Int32",
            EdmValue::Int64(_) => "Edm.Int64",
            EdmValue::Double(_) => "Edm.Double",
            EdmValue::Boolean(_) => "Edm.Boolean",
            EdmValue::DateTime(_) => "Edm.DateTime",
            EdmValue::Guid(_) => "Edm.Guid",
            EdmValue::Binary(_) => "Edm.Binary",
        }
    }
}

impl From<&str> for EdmValue {
    fn from(v: &str) -> Self {
        EdmValue::String(v.to_string())
    }
}

impl From<String> for EdmValue {
    fn from(v: String) -> Self {
        EdmValue::String(v)
    }
}

impl From<i32> for EdmValue {
    fn from(v: i32) -> Self {
        EdmValue::Int32(v)
    }
}

impl From<i64> for EdmValue {
    fn from(v: i64) -> Self {
        EdmValue::Int64(v)
    }
}

impl From<f64> for EdmValue {
    fn from(v: f64) -> Self {
        EdmValue::Double(v)
    }
}

impl From<bool> for EdmValue {
    fn from(v: bool) -> Self {
        EdmValue::Boolean(v)
    }
}

impl From<DateTime<Utc>> for EdmValue {
    fn from(v: DateTime<Utc>) -> Self {
        EdmValue::DateTime(v)
    }
}

impl From<Uuid> for EdmValue {
    fn from(v: Uuid) -> Self {
        EdmValue::Guid(v)
    }
}

impl From<Vec<u8>> for EdmValue {
    fn from(v: Vec<u8>) -> Self {
        EdmValue::Binary(v)
    }
}

/// Named, non-key properties of an entity.
pub type Properties = BTreeMap<String, EdmValue>;

/// Exposes the partition key of an entity.
pub trait HasPartitionKey {
    fn partition_key(&self) -> &str;
}

/// Exposes the row key of an entity.
pub trait HasRowKey {
    fn row_key(&self) -> &str;
}

/// Exposes the optimistic-concurrency token of an entity.
pub trait HasConcurrencyToken {
    fn etag(&self) -> Option<&str>;
    fn set_etag(&mut self, etag: Option<String>);
}

/// An entity that can be written to and read from a table.
///
/// Decomposition into a [`TableRow`] and reconstruction from one are the
/// entity's responsibility; the storage layer treats keys as opaque strings.
pub trait TableEntity: HasPartitionKey + HasRowKey + HasConcurrencyToken + Send + Sync {
    /// Returns the non-key properties to persist.
    fn properties(&self) -> Properties;

    /// Builds the entity from a row read back from the backend.
    fn from_row(row: TableRow) -> TableResult<Self>
    where
        Self: Sized;

    /// Builds the raw row submitted to the backend.
    fn to_row(&self) -> TableRow {
        TableRow {
            partition_key: self.partition_key().to_string(),
            row_key: self.row_key().to_string(),
            etag: self.etag().map(str::to_string),
            timestamp: None,
            properties: self.properties(),
        }
    }
}

/// Generic key-value record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableRow {
    pub partition_key: String,
    pub row_key: String,
    pub etag: Option<String>,
    /// Server-assigned last-modified time; never written by the client.
    pub timestamp: Option<DateTime<Utc>>,
    pub properties: Properties,
}

impl TableRow {
    /// Creates an empty row with the given keys.
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            ..Default::default()
        }
    }

    /// Adds a property, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<EdmValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&EdmValue> {
        self.properties.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.properties.get(name) {
            Some(EdmValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.properties.get(name) {
            Some(EdmValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn get_i32(&self, name: &str) -> Option<i32> {
        match self.properties.get(name) {
            Some(EdmValue::Int32(v)) => Some(*v),
            _ => None,
        }
    }

    /// Reads an integer property; Int32 values widen.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.properties.get(name) {
            Some(EdmValue::Int64(v)) => Some(*v),
            Some(EdmValue::Int32(v)) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Reads a numeric property as a double. Whole numbers may come back
    /// from the service typed as Int32, so those are widened too.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.properties.get(name) {
            Some(EdmValue::Double(v)) => Some(*v),
            Some(EdmValue::Int32(v)) => Some(f64::from(*v)),
            _ => None,
        }
    }

    pub fn get_datetime(&self, name: &str) -> Option<DateTime<Utc>> {
        match self.properties.get(name) {
            Some(EdmValue::DateTime(dt)) => Some(*dt),
            _ => None,
        }
    }

    /// Like [`TableRow::get_str`], but a missing property is an error.
    pub fn require_str(&self, name: &str) -> TableResult<&str> {
        self.get_str(name)
            .ok_or_else(|| TableError::InvalidData(format!("missing string property {name}")))
    }
}

impl HasPartitionKey for TableRow {
    fn partition_key(&self) -> &str {
        &self.partition_key
    }
}

impl HasRowKey for TableRow {
    fn row_key(&self) -> &str {
        &self.row_key
    }
}

impl HasConcurrencyToken for TableRow {
    fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    fn set_etag(&mut self, etag: Option<String>) {
        self.etag = etag;
    }
}

impl TableEntity for TableRow {
    fn properties(&self) -> Properties {
        self.properties.clone()
    }

    fn from_row(row: TableRow) -> TableResult<Self> {
        Ok(row)
    }

    fn to_row(&self) -> TableRow {
        self.clone()
    }
}
