//! Watering control: manual toggles, the automatic schedule and
//! prediction-driven runs.

pub mod control;

use thiserror::Error;

use crate::decision::DecisionError;
use crate::persistence::PersistenceError;

pub use control::{Evaluation, ToggleOutcome, WateringControl, WateringSchedule, WateringStatusReport};

#[derive(Error, Debug)]
pub enum WateringError {
    #[error("Invalid watering request: {0}")]
    Invalid(String),

    #[error(transparent)]
    Decision(#[from] DecisionError),

    #[error("Failed to read watering history: {0}")]
    Persistence(#[from] PersistenceError),
}

impl WateringError {
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid(message.into())
    }
}
