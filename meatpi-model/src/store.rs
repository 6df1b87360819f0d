//! Reads used by the MeatPi pages.

use crate::cook::{self, CookEntity};
use crate::error::ModelResult;
use crate::reading::{self, ReadingEntity};
use chrono::{DateTime, Duration, Utc};
use meatpi_table::TableClient;

/// How many hours before a cook's last reading the cook page looks back.
pub const READING_WINDOW_HOURS: i64 = 2;

/// Cooks active after `since`, most recently updated first.
pub async fn recent_cooks(
    client: &TableClient,
    since: DateTime<Utc>,
) -> ModelResult<Vec<CookEntity>> {
    let mut cooks: Vec<CookEntity> = client
        .query(cook::TABLE_NAME, [cook::cooks_since(since)])
        .await?;
    cooks.sort_by(|a, b| b.last_time.cmp(&a.last_time));
    Ok(cooks)
}

pub async fn load_cook(
    client: &TableClient,
    device_id: &str,
    cook_id: &str,
) -> ModelResult<Option<CookEntity>> {
    Ok(client.get(cook::TABLE_NAME, device_id, cook_id).await?)
}

/// Readings of one cook written in the window ending at `last_reading`,
/// newest first.
pub async fn recent_readings(
    client: &TableClient,
    device_id: &str,
    cook_id: &str,
    last_reading: DateTime<Utc>,
) -> ModelResult<Vec<ReadingEntity>> {
    let mut readings: Vec<ReadingEntity> = client
        .query(
            reading::TABLE_NAME,
            [
                reading::readings_for_cook(device_id, cook_id),
                reading::readings_since(last_reading - Duration::hours(READING_WINDOW_HOURS)),
            ],
        )
        .await?;
    readings.sort_by(|a, b| b.time().cmp(a.time()));
    Ok(readings)
}

/// Records a batch of readings for one cook.
pub async fn save_readings(
    client: &TableClient,
    readings: &mut [ReadingEntity],
) -> ModelResult<()> {
    client
        .insert_or_replace_batch(reading::TABLE_NAME, readings)
        .await?;
    Ok(())
}
