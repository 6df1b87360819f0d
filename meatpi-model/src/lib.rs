//! Table entities for MeatPi.
//!
//! - [`CookEntity`]: one row per cook, keyed by device and cook id
//! - [`ReadingEntity`]: one row per sample, partitioned by `device|cook`
//! - [`ProbeReading`]: the probe payload carried inside a reading
//!
//! The [`store`] module holds the queries the web pages run.

mod cook;
mod error;
mod reading;
pub mod store;

pub use cook::{CookEntity, cooks_for_device, cooks_since};
pub use error::{ModelError, ModelResult};
pub use reading::{
    CHAMBER_PIN, FOOD_ONE_PIN, FOOD_TWO_PIN, KEY_SEPARATOR, ProbeReading, ReadingEntity,
    partition_key_for, readings_for_cook, readings_since,
};

/// Table names.
pub mod tables {
    pub use crate::cook::TABLE_NAME as COOK;
    pub use crate::reading::TABLE_NAME as READING;
}
