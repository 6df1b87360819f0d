//! JSON entity payloads (OData minimal metadata).
//!
//! Types JSON can express natively (strings, booleans, Int32) travel bare;
//! everything else is sent as a string or number with a
//! `Property@odata.type` annotation.

use crate::condition::format_datetime;
use crate::entity::{EdmValue, PARTITION_KEY, ROW_KEY, TIMESTAMP, TableRow};
use crate::error::{TableError, TableResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use uuid::Uuid;

const ANNOTATION_SUFFIX: &str = "@odata.type";
const ETAG_FIELD: &str = "odata.etag";

/// Serializes a row for a write request. Keys are always included; the
/// service ignores `Timestamp`, so it is never sent.
pub(crate) fn row_to_json(row: &TableRow) -> Value {
    let mut object = Map::new();
    object.insert(PARTITION_KEY.to_string(), json!(row.partition_key));
    object.insert(ROW_KEY.to_string(), json!(row.row_key));

    for (name, value) in &row.properties {
        let (encoded, annotated) = match value {
            EdmValue::String(s) => (json!(s), false),
            EdmValue::Int32(v) => (json!(v), false),
            EdmValue::Boolean(v) => (json!(v), false),
            EdmValue::Int64(v) => (json!(v.to_string()), true),
            EdmValue::Double(v) if v.is_finite() => (json!(v), true),
            EdmValue::Double(v) => (json!(non_finite_name(*v)), true),
            EdmValue::DateTime(dt) => (json!(format_datetime(dt)), true),
            EdmValue::Guid(g) => (json!(g.hyphenated().to_string()), true),
            EdmValue::Binary(bytes) => (json!(STANDARD.encode(bytes)), true),
        };
        if annotated {
            object.insert(format!("{name}{ANNOTATION_SUFFIX}"), json!(value.edm_type()));
        }
        object.insert(name.clone(), encoded);
    }

    Value::Object(object)
}

/// Parses one entity object returned by the service.
pub(crate) fn row_from_json(value: Value) -> TableResult<TableRow> {
    let Value::Object(object) = value else {
        return Err(TableError::InvalidData("entity is not a JSON object".to_string()));
    };

    let key = |name: &str| -> TableResult<String> {
        object
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| TableError::InvalidData(format!("entity without {name}")))
    };

    let mut row = TableRow::new(key(PARTITION_KEY)?, key(ROW_KEY)?);
    row.etag = object
        .get(ETAG_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string);
    row.timestamp = match object.get(TIMESTAMP).and_then(Value::as_str) {
        Some(ts) => Some(parse_datetime(TIMESTAMP, ts)?),
        None => None,
    };

    for (name, value) in &object {
        if name == PARTITION_KEY
            || name == ROW_KEY
            || name == TIMESTAMP
            || name.starts_with("odata.")
            || name.ends_with(ANNOTATION_SUFFIX)
        {
            continue;
        }
        let edm_type = object
            .get(&format!("{name}{ANNOTATION_SUFFIX}"))
            .and_then(Value::as_str);
        if let Some(parsed) = parse_property(name, value, edm_type)? {
            row.properties.insert(name.clone(), parsed);
        }
    }

    Ok(row)
}

fn parse_property(
    name: &str,
    value: &Value,
    edm_type: Option<&str>,
) -> TableResult<Option<EdmValue>> {
    let invalid =
        || TableError::InvalidData(format!("property {name} has unexpected value {value}"));

    let parsed = match (edm_type, value) {
        (_, Value::Null) => return Ok(None),
        (Some("Edm.Int64"), Value::String(s)) => EdmValue::Int64(s.parse().map_err(|_| invalid())?),
        (Some("Edm.Int64"), Value::Number(n)) => EdmValue::Int64(n.as_i64().ok_or_else(invalid)?),
        (Some("Edm.DateTime"), Value::String(s)) => EdmValue::DateTime(parse_datetime(name, s)?),
        (Some("Edm.Guid"), Value::String(s)) => {
            EdmValue::Guid(Uuid::parse_str(s).map_err(|_| invalid())?)
        }
        (Some("Edm.Binary"), Value::String(s)) => {
            EdmValue::Binary(STANDARD.decode(s).map_err(|_| invalid())?)
        }
        (Some("Edm.Double"), Value::Number(n)) => EdmValue::Double(n.as_f64().ok_or_else(invalid)?),
        (Some("Edm.Double"), Value::String(s)) => {
            EdmValue::Double(parse_non_finite(s).ok_or_else(invalid)?)
        }
        (Some("Edm.String") | None, Value::String(s)) => EdmValue::String(s.clone()),
        (Some("Edm.Boolean") | None, Value::Bool(b)) => EdmValue::Boolean(*b),
        (Some("Edm.Int32") | None, Value::Number(n)) => match n.as_i64() {
            Some(v) => match i32::try_from(v) {
                Ok(v) => EdmValue::Int32(v),
                Err(_) => EdmValue::Int64(v),
            },
            None => EdmValue::Double(n.as_f64().ok_or_else(invalid)?),
        },
        _ => return Err(invalid()),
    };
    Ok(Some(parsed))
}

fn parse_datetime(name: &str, s: &str) -> TableResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TableError::InvalidData(format!("property {name}: bad datetime {s}: {e}")))
}

fn non_finite_name(v: f64) -> &'static str {
    if v.is_nan() {
        "NaN"
    } else if v.is_sign_positive() {
        "Infinity"
    } else {
        "-Infinity"
    }
}

fn parse_non_finite(s: &str) -> Option<f64> {
    match s {
        "NaN" => Some(f64::NAN),
        "Infinity" | "INF" => Some(f64::INFINITY),
        "-Infinity" | "-INF" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn annotates_types_json_cannot_express() {
        let row = TableRow::new("dev1|cook1", "2024-05-01T10:00:00")
            .with("ChamberTarget", 225.0)
            .with("IsCookerOn", true)
            .with("Count", 3_000_000_000_i64)
            .with("Readings", "[]");
        let body = row_to_json(&row);

        assert_eq!(body["PartitionKey"], "dev1|cook1");
        assert_eq!(body["ChamberTarget@odata.type"], "Edm.Double");
        assert_eq!(body["Count"], "3000000000");
        assert_eq!(body["Count@odata.type"], "Edm.Int64");
        assert_eq!(body["IsCookerOn"], true);
        assert!(body.get("Readings@odata.type").is_none());
    }

    #[test]
    fn parses_service_entity() {
        let body = json!({
            "odata.etag": "W/\"datetime'2024-05-01T10%3A00%3A01.5Z'\"",
            "PartitionKey": "dev1",
            "RowKey": "cook1",
            "Timestamp": "2024-05-01T10:00:01.5Z",
            "StartTime": "T0",
            "Probe": 2,
            "Big@odata.type": "Edm.Int64",
            "Big": "9000000000",
            "When@odata.type": "Edm.DateTime",
            "When": "2024-05-01T09:00:00Z",
            "Target": 225.5
        });
        let row = row_from_json(body).unwrap();

        assert_eq!(row.partition_key, "dev1");
        assert_eq!(row.row_key, "cook1");
        assert!(row.etag.as_ref().unwrap().starts_with("W/"));
        assert!(row.timestamp.is_some());
        assert_eq!(row.get_str("StartTime"), Some("T0"));
        assert_eq!(row.get_i32("Probe"), Some(2));
        assert_eq!(row.get_i64("Big"), Some(9_000_000_000));
        assert_eq!(
            row.get_datetime("When"),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap())
        );
        assert_eq!(row.get_f64("Target"), Some(225.5));
        assert!(row.get("Timestamp").is_none());
    }

    #[test]
    fn rejects_entity_without_keys() {
        let err = row_from_json(json!({"RowKey": "r"})).unwrap_err();
        assert!(matches!(err, TableError::InvalidData(_)));
    }
}
