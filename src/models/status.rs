use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::constants::status;

/// Latest watering activity reported by a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WateringState {
    pub active: bool,
    pub status: String,
    pub last_update: Option<DateTime<FixedOffset>>,
}

impl WateringState {
    /// Returned for devices that never reported watering status
    pub fn unknown() -> Self {
        Self {
            active: false,
            status: status::UNKNOWN.to_string(),
            last_update: None,
        }
    }

    pub fn is_known(&self) -> bool {
        self.last_update.is_some()
    }
}

/// Latest water tank level reported by a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankState {
    pub has_water: bool,
    pub status: String,
    pub last_update: Option<DateTime<FixedOffset>>,
}

impl TankState {
    /// Returned for devices that never reported tank status
    pub fn unknown() -> Self {
        Self {
            has_water: false,
            status: status::UNKNOWN.to_string(),
            last_update: None,
        }
    }

    pub fn is_known(&self) -> bool {
        self.last_update.is_some()
    }
}
