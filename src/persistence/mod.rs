//! # Persistence Gateway
//!
//! Opaque write/read surface for finalized sensor records, predictions and
//! actuation events. Callers treat every write as at-most-once: failures are
//! reported back, logged at the call site and never retried.
//!
//! Two implementations ship with the crate:
//!
//! - [`InMemoryGateway`]: process-local storage, used when no database URL is
//!   configured and throughout the test suite
//! - [`PgGateway`]: Postgres via `sqlx`, one transaction per write

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ActuationEvent, Prediction, SensorRecord};

pub use memory::InMemoryGateway;
pub use postgres::PgGateway;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Write failed for {entity}: {reason}")]
    WriteFailed { entity: String, reason: String },

    #[error("Stored row is invalid: {0}")]
    InvalidRow(String),
}

impl PersistenceError {
    pub fn write_failed<E: Into<String>, R: Into<String>>(entity: E, reason: R) -> Self {
        Self::WriteFailed {
            entity: entity.into(),
            reason: reason.into(),
        }
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn write_sensor_record(&self, record: &SensorRecord) -> PersistenceResult<()>;

    async fn write_prediction(&self, prediction: &Prediction) -> PersistenceResult<()>;

    async fn write_actuation_event(&self, event: &ActuationEvent) -> PersistenceResult<()>;

    /// Most recent record for a device by timestamp
    async fn latest_record(&self, device_id: &str) -> PersistenceResult<Option<SensorRecord>>;

    /// Newest first
    async fn recent_records(
        &self,
        device_id: &str,
        limit: usize,
    ) -> PersistenceResult<Vec<SensorRecord>>;

    /// Newest first, across all devices
    async fn recent_actuation_events(&self, limit: usize) -> PersistenceResult<Vec<ActuationEvent>>;
}
