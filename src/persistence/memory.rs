use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::constants;
use crate::models::{ActuationEvent, Prediction, SensorRecord};
use crate::persistence::{PersistenceError, PersistenceGateway, PersistenceResult};

/// Process-local gateway.
///
/// Rows are kept in insertion order, at most `retention` per table; the
/// oldest rows are discarded first. [`InMemoryGateway::fail_writes`] makes
/// every subsequent write fail, which lets callers exercise their
/// storage-failure paths.
#[derive(Debug)]
pub struct InMemoryGateway {
    records: RwLock<VecDeque<SensorRecord>>,
    predictions: RwLock<VecDeque<Prediction>>,
    events: RwLock<VecDeque<ActuationEvent>>,
    retention: usize,
    failing: AtomicBool,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::with_retention(constants::memory::DEFAULT_RETENTION)
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `retention` rows per table (a zero cap is treated as one)
    pub fn with_retention(retention: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::new()),
            predictions: RwLock::new(VecDeque::new()),
            events: RwLock::new(VecDeque::new()),
            retention: retention.max(1),
            failing: AtomicBool::new(false),
        }
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<SensorRecord> {
        self.records.read().iter().cloned().collect()
    }

    pub fn predictions(&self) -> Vec<Prediction> {
        self.predictions.read().iter().cloned().collect()
    }

    pub fn actuation_events(&self) -> Vec<ActuationEvent> {
        self.events.read().iter().cloned().collect()
    }

    fn check_writable(&self, entity: &str) -> PersistenceResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::write_failed(entity, "storage unavailable"));
        }
        Ok(())
    }

    fn append<T>(&self, table: &RwLock<VecDeque<T>>, row: T) {
        let mut rows = table.write();
        rows.push_back(row);
        while rows.len() > self.retention {
            rows.pop_front();
        }
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    async fn write_sensor_record(&self, record: &SensorRecord) -> PersistenceResult<()> {
        self.check_writable("sensor_readings")?;
        self.append(&self.records, record.clone());
        Ok(())
    }

    async fn write_prediction(&self, prediction: &Prediction) -> PersistenceResult<()> {
        self.check_writable("predictions")?;
        self.append(&self.predictions, prediction.clone());
        Ok(())
    }

    async fn write_actuation_event(&self, event: &ActuationEvent) -> PersistenceResult<()> {
        self.check_writable("watering_events")?;
        self.append(&self.events, event.clone());
        Ok(())
    }

    async fn latest_record(&self, device_id: &str) -> PersistenceResult<Option<SensorRecord>> {
        // Later inserts win ties on timestamp
        let records = self.records.read();
        let latest = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.device_id == device_id)
            .max_by_key(|(index, r)| (r.timestamp, *index))
            .map(|(_, r)| r.clone());
        Ok(latest)
    }

    async fn recent_records(
        &self,
        device_id: &str,
        limit: usize,
    ) -> PersistenceResult<Vec<SensorRecord>> {
        let mut records: Vec<SensorRecord> = self
            .records
            .read()
            .iter()
            .filter(|r| r.device_id == device_id)
            .cloned()
            .collect();
        records.reverse();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(limit);
        Ok(records)
    }

    async fn recent_actuation_events(&self, limit: usize) -> PersistenceResult<Vec<ActuationEvent>> {
        let mut events = self.actuation_events();
        events.reverse();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events.truncate(limit);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TriggerSource;
    use chrono::{Duration, FixedOffset, TimeZone};

    fn record(device: &str, minute: u32, soil: f64) -> SensorRecord {
        SensorRecord {
            device_id: device.to_string(),
            timestamp: FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2025, 1, 1, 12, minute, 0)
                .unwrap(),
            temperature: 20.0,
            humidity: 50.0,
            soil_moisture: soil,
            light_level: None,
            pressure: None,
        }
    }

    #[tokio::test]
    async fn test_latest_record_per_device() {
        let gateway = InMemoryGateway::new();
        gateway.write_sensor_record(&record("plant1", 5, 10.0)).await.unwrap();
        gateway.write_sensor_record(&record("plant1", 1, 20.0)).await.unwrap();
        gateway.write_sensor_record(&record("plant2", 9, 30.0)).await.unwrap();

        let latest = gateway.latest_record("plant1").await.unwrap().unwrap();
        assert_eq!(latest.soil_moisture, 10.0);
        assert!(gateway.latest_record("plant3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_same_timestamp_prefers_later_write() {
        let gateway = InMemoryGateway::new();
        gateway.write_sensor_record(&record("plant1", 5, 10.0)).await.unwrap();
        gateway.write_sensor_record(&record("plant1", 5, 11.0)).await.unwrap();

        let latest = gateway.latest_record("plant1").await.unwrap().unwrap();
        assert_eq!(latest.soil_moisture, 11.0);

        let recent = gateway.recent_records("plant1", 1).await.unwrap();
        assert_eq!(recent[0].soil_moisture, 11.0);
    }

    #[tokio::test]
    async fn test_retention_discards_oldest_rows() {
        let gateway = InMemoryGateway::with_retention(3);
        for minute in 0..10 {
            gateway
                .write_sensor_record(&record("plant1", minute, f64::from(minute)))
                .await
                .unwrap();
        }

        let kept = gateway.records();
        assert_eq!(kept.len(), 3);
        let soils: Vec<f64> = kept.iter().map(|r| r.soil_moisture).collect();
        assert_eq!(soils, vec![7.0, 8.0, 9.0]);

        let latest = gateway.latest_record("plant1").await.unwrap().unwrap();
        assert_eq!(latest.soil_moisture, 9.0);
    }

    #[tokio::test]
    async fn test_retention_applies_per_table() {
        let gateway = InMemoryGateway::with_retention(2);
        let base = record("plant1", 0, 0.0).timestamp;
        for offset in 0..5 {
            gateway
                .write_actuation_event(&ActuationEvent {
                    device_id: "plant1".to_string(),
                    timestamp: base + Duration::minutes(offset),
                    duration_seconds: 10,
                    water_amount: None,
                    triggered_by: TriggerSource::Manual,
                })
                .await
                .unwrap();
        }
        gateway.write_sensor_record(&record("plant1", 0, 1.0)).await.unwrap();

        assert_eq!(gateway.actuation_events().len(), 2);
        assert_eq!(gateway.records().len(), 1);
        assert_eq!(InMemoryGateway::with_retention(0).retention(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let gateway = InMemoryGateway::new();
        gateway.fail_writes(true);
        let err = gateway
            .write_sensor_record(&record("plant1", 0, 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::WriteFailed { .. }));
        assert!(gateway.records().is_empty());

        gateway.fail_writes(false);
        gateway.write_sensor_record(&record("plant1", 0, 1.0)).await.unwrap();
        assert_eq!(gateway.records().len(), 1);
    }

    #[tokio::test]
    async fn test_recent_actuation_events_newest_first() {
        let gateway = InMemoryGateway::new();
        let base = record("plant1", 0, 0.0).timestamp;
        for offset in 0..3 {
            gateway
                .write_actuation_event(&ActuationEvent {
                    device_id: "plant1".to_string(),
                    timestamp: base + Duration::minutes(offset),
                    duration_seconds: 10,
                    water_amount: None,
                    triggered_by: TriggerSource::Manual,
                })
                .await
                .unwrap();
        }

        let events = gateway.recent_actuation_events(2).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].timestamp > events[1].timestamp);
    }
}
