use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// What caused a watering run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Manual,
    Scheduled,
    MlPrediction,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
            Self::MlPrediction => "ml_prediction",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "manual" => Some(Self::Manual),
            "scheduled" => Some(Self::Scheduled),
            "ml_prediction" => Some(Self::MlPrediction),
            _ => None,
        }
    }
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A locally recorded watering run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuationEvent {
    pub device_id: String,
    pub timestamp: DateTime<FixedOffset>,
    pub duration_seconds: u32,
    /// Liters, when the device reports it
    pub water_amount: Option<f64>,
    pub triggered_by: TriggerSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_source_round_trips_through_text() {
        for source in [
            TriggerSource::Manual,
            TriggerSource::Scheduled,
            TriggerSource::MlPrediction,
        ] {
            assert_eq!(TriggerSource::parse(source.as_str()), Some(source));
            assert_eq!(
                serde_json::to_value(source).unwrap(),
                serde_json::Value::String(source.to_string())
            );
        }
        assert_eq!(TriggerSource::parse("cron"), None);
    }
}
