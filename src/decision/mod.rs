//! Watering decisions: a model-or-rules engine and the service that feeds it
//! from stored records.

pub mod engine;
pub mod model;
pub mod service;

use thiserror::Error;

use crate::persistence::PersistenceError;

pub use engine::{rule_based, DecisionEngine, Strategy};
pub use model::{Classifier, InferenceError, LogisticModel, ModelError};
pub use service::PredictionService;

#[derive(Error, Debug)]
pub enum DecisionError {
    #[error("No sensor data for {device_id}")]
    NoData { device_id: String },

    #[error("Failed to read sensor data: {0}")]
    Persistence(#[from] PersistenceError),
}

impl DecisionError {
    pub fn no_data<S: Into<String>>(device_id: S) -> Self {
        Self::NoData {
            device_id: device_id.into(),
        }
    }
}
