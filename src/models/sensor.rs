use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::constants::fields;

/// A telemetry field the aggregator knows how to buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorField {
    Temperature,
    Humidity,
    SoilMoisture,
    LightLevel,
    Pressure,
}

impl SensorField {
    /// Fields that must all be present before a record is emitted
    pub const MANDATORY: [SensorField; 3] = [
        SensorField::Temperature,
        SensorField::Humidity,
        SensorField::SoilMoisture,
    ];

    /// Map a payload key to a buffer field; unknown keys yield `None`
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            fields::TEMPERATURE => Some(Self::Temperature),
            fields::HUMIDITY => Some(Self::Humidity),
            fields::SOIL_MOISTURE => Some(Self::SoilMoisture),
            fields::LIGHT_LEVEL => Some(Self::LightLevel),
            fields::PRESSURE => Some(Self::Pressure),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temperature => fields::TEMPERATURE,
            Self::Humidity => fields::HUMIDITY,
            Self::SoilMoisture => fields::SOIL_MOISTURE,
            Self::LightLevel => fields::LIGHT_LEVEL,
            Self::Pressure => fields::PRESSURE,
        }
    }
}

impl std::fmt::Display for SensorField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-device accumulator of the most recent value for each known field.
///
/// Values are overwritten in place; the buffer is never reset, so once the
/// mandatory fields have all been seen every later merge yields a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceBuffer {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub light_level: Option<f64>,
    pub pressure: Option<f64>,
    pub last_update: Option<DateTime<FixedOffset>>,
}

impl DeviceBuffer {
    pub fn get(&self, field: SensorField) -> Option<f64> {
        match field {
            SensorField::Temperature => self.temperature,
            SensorField::Humidity => self.humidity,
            SensorField::SoilMoisture => self.soil_moisture,
            SensorField::LightLevel => self.light_level,
            SensorField::Pressure => self.pressure,
        }
    }

    pub fn set(&mut self, field: SensorField, value: f64) {
        let slot = match field {
            SensorField::Temperature => &mut self.temperature,
            SensorField::Humidity => &mut self.humidity,
            SensorField::SoilMoisture => &mut self.soil_moisture,
            SensorField::LightLevel => &mut self.light_level,
            SensorField::Pressure => &mut self.pressure,
        };
        *slot = Some(value);
    }

    pub fn is_complete(&self) -> bool {
        SensorField::MANDATORY
            .iter()
            .all(|field| self.get(*field).is_some())
    }

    /// Snapshot the buffer into a record if the mandatory fields are present
    pub fn snapshot(
        &self,
        device_id: &str,
        fallback_timestamp: DateTime<FixedOffset>,
    ) -> Option<SensorRecord> {
        Some(SensorRecord {
            device_id: device_id.to_string(),
            timestamp: self.last_update.unwrap_or(fallback_timestamp),
            temperature: self.temperature?,
            humidity: self.humidity?,
            soil_moisture: self.soil_moisture?,
            light_level: self.light_level,
            pressure: self.pressure,
        })
    }
}

/// A complete reading assembled from one or more partial telemetry messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub device_id: String,
    pub timestamp: DateTime<FixedOffset>,
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
    pub light_level: Option<f64>,
    pub pressure: Option<f64>,
}

impl SensorRecord {
    /// Body of a `sensor_update` envelope
    pub fn update_payload(&self) -> Value {
        json!({
            "temperature": self.temperature,
            "humidity": self.humidity,
            "soil_moisture": self.soil_moisture,
            "light_level": self.light_level,
            "pressure": self.pressure,
            "timestamp": self.timestamp.to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stamp() -> DateTime<FixedOffset> {
        FixedOffset::west_opt(6 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 3, 14, 9, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_field_key_mapping() {
        for key in fields::ALL {
            let field = SensorField::from_key(key).expect("known field");
            assert_eq!(field.as_str(), key);
        }
        assert_eq!(SensorField::from_key("co2"), None);
        assert_eq!(SensorField::from_key("Temperature"), None);
    }

    #[test]
    fn test_buffer_completeness_ignores_optional_fields() {
        let mut buffer = DeviceBuffer::default();
        buffer.set(SensorField::LightLevel, 400.0);
        buffer.set(SensorField::Pressure, 1013.0);
        assert!(!buffer.is_complete());

        buffer.set(SensorField::Temperature, 20.0);
        buffer.set(SensorField::Humidity, 50.0);
        assert!(!buffer.is_complete());

        buffer.set(SensorField::SoilMoisture, 25.0);
        assert!(buffer.is_complete());
    }

    #[test]
    fn test_snapshot_requires_mandatory_fields() {
        let mut buffer = DeviceBuffer::default();
        buffer.set(SensorField::Temperature, 20.0);
        assert!(buffer.snapshot("plant1", stamp()).is_none());

        buffer.set(SensorField::Humidity, 50.0);
        buffer.set(SensorField::SoilMoisture, 25.0);
        let record = buffer.snapshot("plant1", stamp()).expect("complete");
        assert_eq!(record.device_id, "plant1");
        assert_eq!(record.timestamp, stamp());
        assert_eq!(record.light_level, None);
    }

    #[test]
    fn test_update_payload_shape() {
        let record = SensorRecord {
            device_id: "plant1".to_string(),
            timestamp: stamp(),
            temperature: 21.5,
            humidity: 48.0,
            soil_moisture: 33.0,
            light_level: Some(120.0),
            pressure: None,
        };

        let payload = record.update_payload();
        assert_eq!(payload["temperature"], 21.5);
        assert_eq!(payload["light_level"], 120.0);
        assert!(payload["pressure"].is_null());
        assert_eq!(payload["timestamp"], "2025-03-14T09:30:00-06:00");
        assert!(payload.get("device_id").is_none());
    }
}
