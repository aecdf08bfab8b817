//! Wire-level constants shared by the router, the command publisher and the
//! fanout hub.

/// Topic suffixes under `<namespace>/<device_id>/`
pub mod topics {
    pub const WATERING_STATUS_SUFFIX: &str = "watering/status";
    pub const TANK_STATUS_SUFFIX: &str = "tank/status";
    pub const WATERING_COMMAND_SUFFIX: &str = "watering/command";
}

/// Buffer field names accepted in telemetry payloads
pub mod fields {
    pub const TEMPERATURE: &str = "temperature";
    pub const HUMIDITY: &str = "humidity";
    pub const SOIL_MOISTURE: &str = "soil_moisture";
    pub const LIGHT_LEVEL: &str = "light_level";
    pub const PRESSURE: &str = "pressure";

    pub const ALL: [&str; 5] = [TEMPERATURE, HUMIDITY, SOIL_MOISTURE, LIGHT_LEVEL, PRESSURE];
}

/// Status strings reported by the status cache
pub mod status {
    pub const UNKNOWN: &str = "unknown";
    pub const WATERING: &str = "watering";
    pub const IDLE: &str = "idle";
    pub const TANK_OK: &str = "ok";
    pub const TANK_EMPTY: &str = "empty";
}

/// Rule-based decision thresholds
pub mod rules {
    pub const DRY_SOIL_MOISTURE: f64 = 30.0;
    pub const DRY_SOIL_HUMIDITY: f64 = 35.0;
    pub const DRY_CONFIDENCE: f64 = 0.70;
    pub const OPTIMAL_CONFIDENCE: f64 = 0.60;
    pub const DRY_METHOD: &str = "rule-based (dry soil)";
    pub const OPTIMAL_METHOD: &str = "rule-based (optimal)";
    pub const MODEL_METHOD: &str = "model";
}

/// Defaults for the watering schedule
pub mod watering {
    pub const DEFAULT_DURATION_SECONDS: u32 = 10;
    pub const DEFAULT_THRESHOLD: u32 = 30;
    pub const MAX_DURATION_SECONDS: u32 = 600;
}

/// Limits for the process-local persistence fallback
pub mod memory {
    /// Rows kept per table before the oldest are discarded
    pub const DEFAULT_RETENTION: usize = 10_000;
}
