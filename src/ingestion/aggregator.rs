//! # Per-Device Aggregator
//!
//! Devices report their readings piecemeal (one message per sensor). The
//! aggregator keeps one [`DeviceBuffer`] per device id and merges every
//! partial report into it. Whenever the mandatory trio (temperature,
//! humidity, soil_moisture) is present after a merge, a [`SensorRecord`] is
//! snapshotted and returned.
//!
//! Completeness is not latched and the buffer is never cleared: once a device
//! has reported all three mandatory fields, every subsequent merge for that
//! device yields a new record carrying the latest value of each field.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::debug;

use crate::clock::Clock;
use crate::ingestion::error::AggregationError;
use crate::models::{DeviceBuffer, SensorField, SensorRecord};

/// Shared buffer store, keyed by device id
pub type BufferStore = Arc<DashMap<String, DeviceBuffer>>;

#[derive(Debug, Clone)]
pub struct Aggregator {
    buffers: BufferStore,
    clock: Clock,
}

impl Aggregator {
    pub fn new(clock: Clock) -> Self {
        Self::with_store(Arc::new(DashMap::new()), clock)
    }

    pub fn with_store(buffers: BufferStore, clock: Clock) -> Self {
        Self { buffers, clock }
    }

    /// Merge a partial report into the device's buffer.
    ///
    /// Unknown keys are ignored. A known key whose value is not a finite
    /// number (or a string parsing as one) rejects the whole report and
    /// leaves the buffer untouched.
    pub fn merge(
        &self,
        device_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<Option<SensorRecord>, AggregationError> {
        let mut updates = Vec::with_capacity(fields.len());
        for (key, value) in fields {
            let Some(field) = SensorField::from_key(key) else {
                continue;
            };
            let numeric = coerce_numeric(value)
                .ok_or_else(|| AggregationError::non_numeric(device_id, key, value.to_string()))?;
            updates.push((field, numeric));
        }

        let now = self.clock.now();
        let mut buffer = self.buffers.entry(device_id.to_string()).or_default();

        if !updates.is_empty() {
            for (field, numeric) in updates {
                buffer.set(field, numeric);
            }
            buffer.last_update = Some(now);
            debug!(device_id = %device_id, buffer = ?*buffer, "Updated device buffer");
        }

        Ok(buffer.snapshot(device_id, now))
    }

    /// Copy of the current buffer for a device
    pub fn buffer(&self, device_id: &str) -> Option<DeviceBuffer> {
        self.buffers.get(device_id).map(|entry| entry.value().clone())
    }

    /// Number of devices that have reported at least once
    pub fn device_count(&self) -> usize {
        self.buffers.len()
    }
}

/// JSON numbers, or strings holding a number; non-finite values are rejected
fn coerce_numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}
