use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::clock::Clock;
use crate::decision::engine::DecisionEngine;
use crate::decision::DecisionError;
use crate::logging::log_error;
use crate::models::Prediction;
use crate::persistence::PersistenceGateway;

/// Runs the decision engine against a device's latest stored record
#[derive(Clone)]
pub struct PredictionService {
    engine: Arc<DecisionEngine>,
    gateway: Arc<dyn PersistenceGateway>,
    clock: Clock,
}

impl std::fmt::Debug for PredictionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionService")
            .field("engine", &self.engine)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl PredictionService {
    pub fn new(engine: Arc<DecisionEngine>, gateway: Arc<dyn PersistenceGateway>, clock: Clock) -> Self {
        Self {
            engine,
            gateway,
            clock,
        }
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Predict from the latest record and persist the prediction.
    ///
    /// Fails with [`DecisionError::NoData`] when the device has no stored
    /// record. A failed prediction write is logged; the prediction is still
    /// returned.
    #[instrument(skip(self))]
    pub async fn predict_for_device(&self, device_id: &str) -> Result<Prediction, DecisionError> {
        let record = self
            .gateway
            .latest_record(device_id)
            .await?
            .ok_or_else(|| DecisionError::no_data(device_id))?;

        let decision = self
            .engine
            .predict(record.soil_moisture, record.humidity, record.temperature);

        let prediction = Prediction {
            device_id: device_id.to_string(),
            timestamp: self.clock.now(),
            should_water: decision.should_water,
            confidence: decision.confidence,
            method: decision.method,
            soil_moisture: record.soil_moisture,
            humidity: record.humidity,
            temperature: record.temperature,
        };

        if let Err(e) = self.gateway.write_prediction(&prediction).await {
            warn!(device_id = %device_id, error = %e, "Prediction not persisted");
            log_error(
                "prediction_service",
                "write_prediction",
                &e.to_string(),
                Some(device_id),
            );
        }

        info!(
            device_id = %device_id,
            should_water = prediction.should_water,
            confidence = prediction.confidence,
            method = %prediction.method,
            "Prediction made"
        );

        Ok(prediction)
    }
}
