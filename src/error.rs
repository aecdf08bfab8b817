//! Crate-level error type.
//!
//! Each subsystem owns its own `thiserror` enum; `GardenError` wraps them for
//! callers that cross subsystem boundaries (bootstrap, the server binary).

use crate::config::ConfigurationError;
use crate::decision::DecisionError;
use crate::ingestion::{AggregationError, RoutingError};
use crate::messaging::TransportError;
use crate::persistence::PersistenceError;
use crate::watering::WateringError;

#[derive(Debug, thiserror::Error)]
pub enum GardenError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Decision error: {0}")]
    Decision(#[from] DecisionError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Watering error: {0}")]
    Watering(#[from] WateringError),

    #[error("Server error: {0}")]
    Server(String),
}

impl GardenError {
    pub fn server<S: Into<String>>(message: S) -> Self {
        Self::Server(message.into())
    }
}

pub type Result<T> = std::result::Result<T, GardenError>;
