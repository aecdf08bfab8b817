//! # Decision Engine
//!
//! The strategy is resolved exactly once, at construction:
//!
//! - a classifier that loads cleanly is used for every call, and any
//!   inference error falls through to the rule path for that call only
//! - a classifier that fails to load (missing file, bad JSON, wrong shape)
//!   pins the engine to rule-based decisions for its whole lifetime
//!
//! There is no hot reload and no retry of a failed load.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::constants::rules;
use crate::decision::model::{Classifier, LogisticModel};
use crate::models::{Decision, PredictionMethod};

#[derive(Debug, Clone)]
pub enum Strategy {
    Model(Arc<dyn Classifier>),
    RuleBased,
}

#[derive(Debug, Clone)]
pub struct DecisionEngine {
    strategy: Strategy,
}

impl DecisionEngine {
    pub fn new(strategy: Strategy) -> Self {
        Self { strategy }
    }

    pub fn rule_based() -> Self {
        Self::new(Strategy::RuleBased)
    }

    pub fn with_classifier(classifier: Arc<dyn Classifier>) -> Self {
        Self::new(Strategy::Model(classifier))
    }

    /// Load the classifier at `path`, falling back to rules on any failure
    pub fn from_model_path(path: &Path) -> Self {
        match LogisticModel::load(path) {
            Ok(model) => {
                info!(path = %path.display(), "Loaded watering model");
                Self::with_classifier(Arc::new(model))
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Watering model unavailable, using rule-based decisions"
                );
                Self::rule_based()
            }
        }
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn uses_model(&self) -> bool {
        matches!(self.strategy, Strategy::Model(_))
    }

    pub fn predict(&self, soil_moisture: f64, soil_humidity: f64, temperature: f64) -> Decision {
        match &self.strategy {
            Strategy::Model(classifier) => {
                match classifier.infer(soil_moisture, soil_humidity, temperature) {
                    Ok(decision) => decision,
                    Err(e) => {
                        warn!(error = %e, "Model inference failed, using rules for this call");
                        rule_based(soil_moisture, soil_humidity)
                    }
                }
            }
            Strategy::RuleBased => rule_based(soil_moisture, soil_humidity),
        }
    }
}

/// Threshold rules used when no model is available or inference fails
pub fn rule_based(soil_moisture: f64, soil_humidity: f64) -> Decision {
    if soil_moisture < rules::DRY_SOIL_MOISTURE || soil_humidity < rules::DRY_SOIL_HUMIDITY {
        Decision {
            should_water: true,
            confidence: rules::DRY_CONFIDENCE,
            method: PredictionMethod::RuleDrySoil,
        }
    } else {
        Decision {
            should_water: false,
            confidence: rules::OPTIMAL_CONFIDENCE,
            method: PredictionMethod::RuleOptimal,
        }
    }
}
