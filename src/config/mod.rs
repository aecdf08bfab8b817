//! # Garden Configuration System
//!
//! Layered configuration for the ingestion service. Values are resolved in
//! this order, later layers overriding earlier ones:
//!
//! 1. Compiled-in defaults (every section is `#[serde(default)]`)
//! 2. `config/garden.toml`
//! 3. `config/garden.<environment>.toml`
//! 4. Environment variables, `GARDEN__<SECTION>__<KEY>` (e.g. `GARDEN__MQTT__HOST`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use garden_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let broker = &manager.config().mqtt.host;
//! let namespace = &manager.config().mqtt.namespace;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/garden.toml`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GardenConfig {
    /// Broker connection and topic layout
    pub mqtt: MqttConfig,
    /// Optional Postgres persistence
    pub database: DatabaseConfig,
    /// Decision engine settings
    pub decision: DecisionConfig,
    /// Realtime observer settings
    pub fanout: FanoutConfig,
    /// Inbound message queue settings
    pub ingestion: IngestionConfig,
    /// Realtime endpoint bind address
    pub server: ServerConfig,
    /// Wall-clock time zone for stamps
    pub time: TimeConfig,
    /// Watering schedule defaults
    pub watering: WateringConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    /// Generated per process when absent
    pub client_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive_seconds: u64,
    /// First topic segment, e.g. `smartgarden` in `smartgarden/plant1/sensors`
    pub namespace: String,
    /// Regex for the device identifier segment
    pub device_pattern: String,
    /// Capacity of the client request channel
    pub request_capacity: usize,
    /// How long a command publish waits for the broker's PUBACK
    pub ack_timeout_ms: u64,
    /// Pause between reconnect attempts after an event loop error
    pub reconnect_delay_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "viridion_mqtt".to_string(),
            port: 1883,
            client_id: None,
            username: None,
            password: None,
            keep_alive_seconds: 60,
            namespace: "smartgarden".to_string(),
            device_pattern: r"plant\d+".to_string(),
            request_capacity: 64,
            ack_timeout_ms: 5000,
            reconnect_delay_ms: 2000,
        }
    }
}

impl MqttConfig {
    /// Wildcard filter covering every topic under the namespace
    pub fn subscription_filter(&self) -> String {
        format!("{}/#", self.namespace)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_seconds)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres URL; the in-memory gateway is used when unset
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    /// Rows kept per table by the in-memory gateway
    pub memory_retention: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            acquire_timeout_seconds: 5,
            memory_retention: constants::memory::DEFAULT_RETENTION,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Serialized classifier; rule-based decisions are used if it fails to load
    pub model_path: PathBuf,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/watering_model.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Per-observer outbound queue; a full queue evicts the observer
    pub observer_buffer_size: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            observer_buffer_size: 32,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Bounded queue between the MQTT pump and the ingestion worker
    pub queue_buffer_size: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            queue_buffer_size: 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeConfig {
    /// IANA zone name
    pub timezone: String,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            timezone: "America/El_Salvador".to_string(),
        }
    }
}

impl TimeConfig {
    pub fn tz(&self) -> ConfigResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigurationError::invalid(format!("Unknown timezone: {}", self.timezone)))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WateringConfig {
    pub auto_enabled: bool,
    pub default_duration_seconds: u32,
    pub threshold: u32,
}

impl Default for WateringConfig {
    fn default() -> Self {
        Self {
            auto_enabled: true,
            default_duration_seconds: constants::watering::DEFAULT_DURATION_SECONDS,
            threshold: constants::watering::DEFAULT_THRESHOLD,
        }
    }
}

impl GardenConfig {
    /// Validate cross-field constraints that serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.mqtt.namespace.is_empty() || self.mqtt.namespace.contains(|c: char| matches!(c, '/' | '+' | '#')) {
            return Err(ConfigurationError::invalid(
                "mqtt.namespace must be a single non-wildcard topic segment",
            ));
        }

        regex::Regex::new(&self.mqtt.device_pattern).map_err(|e| {
            ConfigurationError::invalid(format!("mqtt.device_pattern is not a valid regex: {e}"))
        })?;

        if self.mqtt.port == 0 || self.server.port == 0 {
            return Err(ConfigurationError::invalid("mqtt.port and server.port must be non-zero"));
        }

        if self.mqtt.request_capacity == 0 {
            return Err(ConfigurationError::invalid("mqtt.request_capacity must be positive"));
        }

        if self.mqtt.ack_timeout_ms == 0 {
            return Err(ConfigurationError::invalid("mqtt.ack_timeout_ms must be positive"));
        }

        if self.database.memory_retention == 0 {
            return Err(ConfigurationError::invalid("database.memory_retention must be positive"));
        }

        if self.ingestion.queue_buffer_size == 0 {
            return Err(ConfigurationError::invalid(
                "ingestion.queue_buffer_size must be positive",
            ));
        }

        if self.fanout.observer_buffer_size == 0 {
            return Err(ConfigurationError::invalid(
                "fanout.observer_buffer_size must be positive",
            ));
        }

        let duration = self.watering.default_duration_seconds;
        if duration == 0 || duration > constants::watering::MAX_DURATION_SECONDS {
            return Err(ConfigurationError::invalid(format!(
                "watering.default_duration_seconds must be within 1..={}",
                constants::watering::MAX_DURATION_SECONDS
            )));
        }

        if self.watering.threshold > 100 {
            return Err(ConfigurationError::invalid("watering.threshold must be within 0..=100"));
        }

        self.time.tz()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GardenConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mqtt.subscription_filter(), "smartgarden/#");
        assert_eq!(config.server.bind_address(), "0.0.0.0:8000");
    }

    #[test]
    fn test_invalid_device_pattern_rejected() {
        let mut config = GardenConfig::default();
        config.mqtt.device_pattern = "plant(".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_wildcard_namespace_rejected() {
        let mut config = GardenConfig::default();
        config.mqtt.namespace = "garden/#".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_port_rejected() {
        let mut config = GardenConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_memory_retention_rejected() {
        let mut config = GardenConfig::default();
        config.database.memory_retention = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_timezone_rejected() {
        let mut config = GardenConfig::default();
        config.time.timezone = "Mars/Olympus_Mons".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::Invalid { .. })
        ));
    }

    #[test]
    fn test_duration_bounds() {
        let mut config = GardenConfig::default();
        config.watering.default_duration_seconds = 0;
        assert!(config.validate().is_err());

        config.watering.default_duration_seconds = 601;
        assert!(config.validate().is_err());

        config.watering.default_duration_seconds = 600;
        assert!(config.validate().is_ok());
    }
}
