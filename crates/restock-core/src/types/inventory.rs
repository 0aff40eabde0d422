//! Items and the counts entered against them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stocked item. Owned by the admin side; read-only to the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    /// Stable key, also the display name.
    pub id: String,
    pub location: String,
    /// Container label used in messages ("case", "tray", ...).
    #[serde(default = "default_unit_type")]
    pub unit_type: String,
    /// Average daily usage.
    pub adu: f64,
    /// Target on-hand quantity.
    pub par_level: f64,
    pub case_size: u32,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_unit_type() -> String { "case".into() }
fn default_true() -> bool { true }

impl Item {
    pub fn new(id: impl Into<String>, location: impl Into<String>, adu: f64, par_level: f64, case_size: u32) -> Self {
        Self {
            id: id.into(),
            location: location.into(),
            unit_type: default_unit_type(),
            adu,
            par_level,
            case_size,
            active: true,
        }
    }

    pub fn with_unit_type(mut self, unit_type: impl Into<String>) -> Self {
        self.unit_type = unit_type.into();
        self
    }
}

/// A nightly on-hand count. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OnHandReading {
    pub item_id: String,
    pub location: String,
    pub counted_at: DateTime<Utc>,
    pub quantity: f64,
}

/// A delivery received at a location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceivedReading {
    pub item_id: String,
    pub location: String,
    pub received_at: DateTime<Utc>,
    pub quantity: f64,
}
