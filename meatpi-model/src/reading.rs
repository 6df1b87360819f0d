use crate::error::{ModelError, ModelResult};
use chrono::{DateTime, Utc};
use meatpi_table::{
    Condition, HasConcurrencyToken, HasPartitionKey, HasRowKey, PARTITION_KEY, Properties,
    TIMESTAMP, TableEntity, TableError, TableResult, TableRow,
};
use serde::{Deserialize, Serialize};

/// Name of the table holding one row per sample.
pub const TABLE_NAME: &str = "Reading";

/// Joins device id and cook id in a reading's partition key.
pub const KEY_SEPARATOR: char = '|';

/// Pin of the chamber probe.
pub const CHAMBER_PIN: i32 = 0;
/// Pin of the first food probe.
pub const FOOD_ONE_PIN: i32 = 2;
/// Pin of the second food probe.
pub const FOOD_TWO_PIN: i32 = 4;

const CHAMBER_TARGET: &str = "ChamberTarget";
const IS_COOKER_ON: &str = "IsCookerOn";
const READINGS: &str = "Readings";

/// Builds the partition key shared by every reading of one cook.
pub fn partition_key_for(device_id: &str, cook_id: &str) -> String {
    format!("{device_id}{KEY_SEPARATOR}{cook_id}")
}

/// One sample taken during a cook.
///
/// Partitioned by `deviceId|cookId` so a whole cook can be read or written
/// as one batch; the row key is the sample time as sent by the device.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadingEntity {
    partition_key: String,
    time: String,
    pub chamber_target: f64,
    pub is_cooker_on: bool,
    /// Raw probe payload, a JSON array of [`ProbeReading`].
    pub readings: String,
    pub etag: Option<String>,
}

impl ReadingEntity {
    pub fn new(device_id: &str, cook_id: &str, time: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key_for(device_id, cook_id),
            time: time.into(),
            ..Default::default()
        }
    }

    pub fn device_id(&self) -> &str {
        self.key_parts().0
    }

    /// Everything after the first separator.
    pub fn cook_id(&self) -> &str {
        self.key_parts().1
    }

    pub fn time(&self) -> &str {
        &self.time
    }

    fn key_parts(&self) -> (&str, &str) {
        // Construction guarantees the separator is present.
        self.partition_key
            .split_once(KEY_SEPARATOR)
            .unwrap_or((self.partition_key.as_str(), ""))
    }

    /// Decodes the probe payload.
    pub fn probes(&self) -> ModelResult<Vec<ProbeReading>> {
        if self.readings.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&self.readings)?)
    }

    /// Replaces the probe payload.
    pub fn set_probes(&mut self, probes: &[ProbeReading]) -> ModelResult<()> {
        self.readings = serde_json::to_string(probes)?;
        Ok(())
    }

    /// The reading taken on `pin`.
    pub fn probe(&self, pin: i32) -> ModelResult<ProbeReading> {
        self.probes()?
            .into_iter()
            .find(|p| p.pin == pin)
            .ok_or(ModelError::MissingProbe(pin))
    }
}

impl HasPartitionKey for ReadingEntity {
    fn partition_key(&self) -> &str {
        &self.partition_key
    }
}

impl HasRowKey for ReadingEntity {
    fn row_key(&self) -> &str {
        &self.time
    }
}

impl HasConcurrencyToken for ReadingEntity {
    fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    fn set_etag(&mut self, etag: Option<String>) {
        self.etag = etag;
    }
}

impl TableEntity for ReadingEntity {
    fn properties(&self) -> Properties {
        let mut properties = Properties::new();
        properties.insert(CHAMBER_TARGET.to_string(), self.chamber_target.into());
        properties.insert(IS_COOKER_ON.to_string(), self.is_cooker_on.into());
        properties.insert(READINGS.to_string(), self.readings.clone().into());
        properties
    }

    fn from_row(row: TableRow) -> TableResult<Self> {
        if !row.partition_key.contains(KEY_SEPARATOR) {
            return Err(TableError::InvalidData(format!(
                "reading partition key {:?} has no {KEY_SEPARATOR:?} separator",
                row.partition_key
            )));
        }

        Ok(Self {
            chamber_target: row.get_f64(CHAMBER_TARGET).unwrap_or_default(),
            is_cooker_on: row.get_bool(IS_COOKER_ON).unwrap_or_default(),
            readings: row.get_str(READINGS).unwrap_or_default().to_string(),
            partition_key: row.partition_key,
            time: row.row_key,
            etag: row.etag,
        })
    }
}

/// One probe sample as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeReading {
    pub pin: i32,
    /// Raw ADC value.
    pub value: i32,
    pub resistance: f64,
    pub kelvins: f64,
}

impl ProbeReading {
    pub fn celsius(&self) -> f64 {
        self.kelvins - 273.15
    }

    pub fn fahrenheit(&self) -> f64 {
        self.celsius() * 9.0 / 5.0 + 32.0
    }
}

/// Every reading of one cook.
pub fn readings_for_cook(device_id: &str, cook_id: &str) -> Condition {
    Condition::eq(PARTITION_KEY, partition_key_for(device_id, cook_id))
}

/// Readings written after `since`.
pub fn readings_since(since: DateTime<Utc>) -> Condition {
    Condition::gt(TIMESTAMP, since)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cook_id_keeps_later_separators() {
        let reading = ReadingEntity::new("pi", "cook|2", "t");
        assert_eq!(reading.device_id(), "pi");
        assert_eq!(reading.cook_id(), "cook|2");
    }

    #[test]
    fn empty_payload_has_no_probes() {
        let reading = ReadingEntity::new("pi", "c", "t");
        assert!(reading.probes().unwrap().is_empty());
        assert!(matches!(reading.probe(CHAMBER_PIN), Err(ModelError::MissingProbe(0))));
    }
}
