use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::constants::rules;

/// Which branch of the decision engine produced a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionMethod {
    #[serde(rename = "model")]
    Model,
    #[serde(rename = "rule-based (dry soil)")]
    RuleDrySoil,
    #[serde(rename = "rule-based (optimal)")]
    RuleOptimal,
}

impl PredictionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => rules::MODEL_METHOD,
            Self::RuleDrySoil => rules::DRY_METHOD,
            Self::RuleOptimal => rules::OPTIMAL_METHOD,
        }
    }

    pub fn is_rule_based(&self) -> bool {
        !matches!(self, Self::Model)
    }
}

impl std::fmt::Display for PredictionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actuation recommendation returned by the decision engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub should_water: bool,
    pub confidence: f64,
    pub method: PredictionMethod,
}

/// A persisted decision together with the readings it was made from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub device_id: String,
    pub timestamp: DateTime<FixedOffset>,
    pub should_water: bool,
    pub confidence: f64,
    pub method: PredictionMethod,
    pub soil_moisture: f64,
    pub humidity: f64,
    pub temperature: f64,
}
