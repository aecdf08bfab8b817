//! Latest-known watering and tank state per device.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::clock::Clock;
use crate::constants::status;
use crate::models::{TankState, WateringState};

#[derive(Debug, Clone)]
pub struct StatusCache {
    watering: Arc<DashMap<String, WateringState>>,
    tank: Arc<DashMap<String, TankState>>,
    clock: Clock,
}

impl StatusCache {
    pub fn new(clock: Clock) -> Self {
        Self {
            watering: Arc::new(DashMap::new()),
            tank: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Replace the watering snapshot; `status` falls back to watering/idle
    pub fn update_watering(
        &self,
        device_id: &str,
        status: Option<&str>,
        is_active: bool,
    ) -> WateringState {
        let status = match status {
            Some(s) if !s.is_empty() => s.to_string(),
            _ if is_active => status::WATERING.to_string(),
            _ => status::IDLE.to_string(),
        };

        let state = WateringState {
            active: is_active,
            status,
            last_update: Some(self.clock.now()),
        };
        debug!(device_id = %device_id, active = is_active, status = %state.status, "Watering status updated");
        self.watering.insert(device_id.to_string(), state.clone());
        state
    }

    pub fn update_tank(&self, device_id: &str, has_water: bool) -> TankState {
        let state = TankState {
            has_water,
            status: if has_water {
                status::TANK_OK.to_string()
            } else {
                status::TANK_EMPTY.to_string()
            },
            last_update: Some(self.clock.now()),
        };
        debug!(device_id = %device_id, has_water = has_water, "Tank status updated");
        self.tank.insert(device_id.to_string(), state.clone());
        state
    }

    pub fn query_watering(&self, device_id: &str) -> WateringState {
        self.watering
            .get(device_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(WateringState::unknown)
    }

    pub fn query_tank(&self, device_id: &str) -> TankState {
        self.tank
            .get(device_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(TankState::unknown)
    }
}
