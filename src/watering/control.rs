use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::clock::Clock;
use crate::config::WateringConfig;
use crate::constants::watering::MAX_DURATION_SECONDS;
use crate::decision::PredictionService;
use crate::ingestion::StatusCache;
use crate::logging::{log_actuation_operation, log_error};
use crate::messaging::CommandPublisher;
use crate::models::{ActuationEvent, Prediction, SensorRecord, TriggerSource};
use crate::persistence::PersistenceGateway;
use crate::watering::WateringError;

/// Automatic watering settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WateringSchedule {
    pub enabled: bool,
    pub duration_seconds: u32,
    /// Soil moisture percentage the schedule targets
    pub threshold: u32,
}

impl WateringSchedule {
    pub fn validate(&self) -> Result<(), WateringError> {
        validate_duration(self.duration_seconds)?;
        if self.duration_seconds == 0 {
            return Err(WateringError::invalid("schedule duration must be positive"));
        }
        if self.threshold > 100 {
            return Err(WateringError::invalid("threshold must be within 0..=100"));
        }
        Ok(())
    }
}

impl From<&WateringConfig> for WateringSchedule {
    fn from(config: &WateringConfig) -> Self {
        Self {
            enabled: config.auto_enabled,
            duration_seconds: config.default_duration_seconds,
            threshold: config.threshold,
        }
    }
}

/// Current watering view for one device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WateringStatusReport {
    pub device_id: String,
    pub active: bool,
    pub schedule: WateringSchedule,
    pub device_status: String,
    pub last_update: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToggleOutcome {
    pub device_id: String,
    pub status: bool,
    pub duration_seconds: u32,
    pub command_sent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub prediction: Prediction,
    /// `None` when no command was dispatched
    pub command_sent: Option<bool>,
}

fn validate_duration(duration_seconds: u32) -> Result<(), WateringError> {
    if duration_seconds > MAX_DURATION_SECONDS {
        return Err(WateringError::invalid(format!(
            "duration {duration_seconds}s exceeds {MAX_DURATION_SECONDS}s"
        )));
    }
    Ok(())
}

/// Manual and prediction-driven actuation.
///
/// Whether a device is watering is read from the status cache; this type
/// keeps no activity flag of its own.
pub struct WateringControl {
    schedule: RwLock<WateringSchedule>,
    status_cache: StatusCache,
    publisher: CommandPublisher,
    predictions: PredictionService,
    gateway: Arc<dyn PersistenceGateway>,
    clock: Clock,
}

impl std::fmt::Debug for WateringControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WateringControl")
            .field("schedule", &*self.schedule.read())
            .field("publisher", &self.publisher)
            .finish_non_exhaustive()
    }
}

impl WateringControl {
    pub fn new(
        schedule: WateringSchedule,
        status_cache: StatusCache,
        publisher: CommandPublisher,
        predictions: PredictionService,
        gateway: Arc<dyn PersistenceGateway>,
        clock: Clock,
    ) -> Self {
        Self {
            schedule: RwLock::new(schedule),
            status_cache,
            publisher,
            predictions,
            gateway,
            clock,
        }
    }

    pub fn schedule(&self) -> WateringSchedule {
        *self.schedule.read()
    }

    pub fn update_schedule(
        &self,
        enabled: bool,
        duration_seconds: u32,
        threshold: u32,
    ) -> Result<WateringSchedule, WateringError> {
        let schedule = WateringSchedule {
            enabled,
            duration_seconds,
            threshold,
        };
        schedule.validate()?;
        *self.schedule.write() = schedule;

        info!(
            enabled = enabled,
            duration_seconds = duration_seconds,
            threshold = threshold,
            "Watering schedule updated"
        );
        Ok(schedule)
    }

    pub fn status(&self, device_id: &str) -> WateringStatusReport {
        let state = self.status_cache.query_watering(device_id);
        WateringStatusReport {
            device_id: device_id.to_string(),
            active: state.active,
            schedule: self.schedule(),
            device_status: state.status,
            last_update: state.last_update,
        }
    }

    /// Send a manual command.
    ///
    /// Starting a run records a manual actuation event whether or not the
    /// broker acknowledged the command.
    #[instrument(skip(self))]
    pub async fn toggle(
        &self,
        device_id: &str,
        status: bool,
        duration_seconds: u32,
    ) -> Result<ToggleOutcome, WateringError> {
        validate_duration(duration_seconds)?;

        let command_sent = self
            .publisher
            .send_command(device_id, status, duration_seconds)
            .await;
        log_actuation_operation(
            "toggle",
            device_id,
            status,
            duration_seconds,
            TriggerSource::Manual.as_str(),
            command_sent,
        );

        if status {
            self.record_event(device_id, duration_seconds, TriggerSource::Manual)
                .await;
        }

        Ok(ToggleOutcome {
            device_id: device_id.to_string(),
            status,
            duration_seconds,
            command_sent,
        })
    }

    /// Predict for the device and water it if the prediction says so and the
    /// schedule is enabled
    #[instrument(skip(self))]
    pub async fn evaluate(&self, device_id: &str) -> Result<Evaluation, WateringError> {
        let prediction = self.predictions.predict_for_device(device_id).await?;
        let schedule = self.schedule();

        if !(prediction.should_water && schedule.enabled) {
            return Ok(Evaluation {
                prediction,
                command_sent: None,
            });
        }

        let command_sent = self
            .publisher
            .send_command(device_id, true, schedule.duration_seconds)
            .await;
        log_actuation_operation(
            "evaluate",
            device_id,
            true,
            schedule.duration_seconds,
            TriggerSource::MlPrediction.as_str(),
            command_sent,
        );
        self.record_event(device_id, schedule.duration_seconds, TriggerSource::MlPrediction)
            .await;

        Ok(Evaluation {
            prediction,
            command_sent: Some(command_sent),
        })
    }

    pub async fn history(&self, limit: usize) -> Result<Vec<ActuationEvent>, WateringError> {
        Ok(self.gateway.recent_actuation_events(limit).await?)
    }

    /// Stored telemetry for one device, newest first
    pub async fn readings(
        &self,
        device_id: &str,
        limit: usize,
    ) -> Result<Vec<SensorRecord>, WateringError> {
        Ok(self.gateway.recent_records(device_id, limit).await?)
    }

    async fn record_event(&self, device_id: &str, duration_seconds: u32, trigger: TriggerSource) {
        let event = ActuationEvent {
            device_id: device_id.to_string(),
            timestamp: self.clock.now(),
            duration_seconds,
            water_amount: None,
            triggered_by: trigger,
        };

        if let Err(e) = self.gateway.write_actuation_event(&event).await {
            log_error(
                "watering_control",
                "write_actuation_event",
                &e.to_string(),
                Some(device_id),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_validation() {
        let schedule = WateringSchedule {
            enabled: true,
            duration_seconds: 10,
            threshold: 30,
        };
        assert!(schedule.validate().is_ok());

        assert!(WateringSchedule {
            duration_seconds: 0,
            ..schedule
        }
        .validate()
        .is_err());
        assert!(WateringSchedule {
            duration_seconds: 601,
            ..schedule
        }
        .validate()
        .is_err());
        assert!(WateringSchedule {
            threshold: 101,
            ..schedule
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_schedule_from_config() {
        let schedule = WateringSchedule::from(&WateringConfig::default());
        assert!(schedule.enabled);
        assert_eq!(schedule.duration_seconds, 10);
        assert_eq!(schedule.threshold, 30);
    }
}
