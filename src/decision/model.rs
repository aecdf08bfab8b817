//! Serialized watering classifier.
//!
//! The on-disk format is a JSON logistic model:
//!
//! ```json
//! {
//!   "features": ["soil_moisture", "soil_humidity", "temperature"],
//!   "weights": [-0.12, -0.05, 0.03],
//!   "bias": 4.1,
//!   "threshold": 0.5
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::models::{Decision, PredictionMethod};

/// Feature order every classifier is evaluated with
pub const FEATURES: [&str; 3] = ["soil_moisture", "soil_humidity", "temperature"];

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read model file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to deserialize model: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("Invalid model shape: {0}")]
    Shape(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("Non-finite input for {feature}")]
    NonFiniteInput { feature: &'static str },

    #[error("Non-finite model output")]
    NonFiniteOutput,
}

/// A loaded classifier that recommends whether to water
pub trait Classifier: Send + Sync + std::fmt::Debug {
    fn infer(
        &self,
        soil_moisture: f64,
        soil_humidity: f64,
        temperature: f64,
    ) -> Result<Decision, InferenceError>;
}

fn default_threshold() -> f64 {
    0.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogisticModel {
    features: Vec<String>,
    weights: Vec<f64>,
    bias: f64,
    #[serde(default = "default_threshold")]
    threshold: f64,
}

impl LogisticModel {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ModelError> {
        let model: Self = serde_json::from_str(contents)?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.features.len() != FEATURES.len()
            || self.features.iter().zip(FEATURES).any(|(a, b)| a != b)
        {
            return Err(ModelError::Shape(format!(
                "expected features {FEATURES:?}, found {:?}",
                self.features
            )));
        }
        if self.weights.len() != FEATURES.len() {
            return Err(ModelError::Shape(format!(
                "expected {} weights, found {}",
                FEATURES.len(),
                self.weights.len()
            )));
        }
        if !self.weights.iter().all(|w| w.is_finite()) || !self.bias.is_finite() {
            return Err(ModelError::Shape("coefficients must be finite".to_string()));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ModelError::Shape(format!(
                "threshold {} outside 0..=1",
                self.threshold
            )));
        }
        Ok(())
    }
}

impl Classifier for LogisticModel {
    fn infer(
        &self,
        soil_moisture: f64,
        soil_humidity: f64,
        temperature: f64,
    ) -> Result<Decision, InferenceError> {
        let inputs = [soil_moisture, soil_humidity, temperature];
        if let Some(index) = inputs.iter().position(|x| !x.is_finite()) {
            return Err(InferenceError::NonFiniteInput {
                feature: FEATURES[index],
            });
        }

        let z = self
            .weights
            .iter()
            .zip(inputs)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;
        let p = 1.0 / (1.0 + (-z).exp());
        if !p.is_finite() {
            return Err(InferenceError::NonFiniteOutput);
        }

        Ok(Decision {
            should_water: p >= self.threshold,
            confidence: p.max(1.0 - p),
            method: PredictionMethod::Model,
        })
    }
}
