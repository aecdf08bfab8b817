use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Envelope `type` tag sent to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeType {
    SensorUpdate,
    WateringUpdate,
    TankUpdate,
}

/// `{type, plant_id, data}` as delivered to observers
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    #[serde(rename = "type")]
    pub kind: EnvelopeType,
    pub plant_id: &'a str,
    pub data: &'a Value,
}

/// A live observer connection: a bounded queue of serialized envelopes
#[derive(Debug, Clone)]
pub struct ObserverHandle {
    id: Uuid,
    tx: mpsc::Sender<String>,
}

impl ObserverHandle {
    /// Create a handle and the receiving end its connection drains
    pub fn new(buffer_size: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        (
            Self {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// Per-device registry of observers.
///
/// Sends never block: an observer whose queue is full or closed is evicted
/// after the broadcast that found it failing.
#[derive(Debug, Clone)]
pub struct FanoutHub {
    buckets: Arc<DashMap<String, Vec<ObserverHandle>>>,
    buffer_size: usize,
}

impl FanoutHub {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            buffer_size,
        }
    }

    /// Create a handle sized for this hub
    pub fn new_handle(&self) -> (ObserverHandle, mpsc::Receiver<String>) {
        ObserverHandle::new(self.buffer_size)
    }

    pub fn connect(&self, handle: ObserverHandle, device_id: &str) {
        let id = handle.id;
        let count = {
            let mut bucket = self.buckets.entry(device_id.to_string()).or_default();
            bucket.push(handle);
            bucket.len()
        };
        info!(device_id = %device_id, observer = %id, observers = count, "Observer connected");
    }

    /// Remove an observer; returns whether it was registered
    pub fn disconnect(&self, handle_id: Uuid, device_id: &str) -> bool {
        let removed = match self.buckets.get_mut(device_id) {
            Some(mut bucket) => {
                let before = bucket.len();
                bucket.retain(|h| h.id != handle_id);
                before != bucket.len()
            }
            None => false,
        };
        self.buckets.remove_if(device_id, |_, bucket| bucket.is_empty());

        if removed {
            info!(device_id = %device_id, observer = %handle_id, "Observer disconnected");
        }
        removed
    }

    /// Send an envelope to every observer of `device_id`.
    ///
    /// Returns the number of observers the envelope was queued for.
    pub fn publish(&self, device_id: &str, kind: EnvelopeType, payload: Value) -> usize {
        let envelope = Envelope {
            kind,
            plant_id: device_id,
            data: &payload,
        };
        let text = match serde_json::to_string(&envelope) {
            Ok(text) => text,
            Err(e) => {
                warn!(device_id = %device_id, error = %e, "Failed to serialize envelope");
                return 0;
            }
        };

        let (delivered, failed) = {
            let Some(bucket) = self.buckets.get(device_id) else {
                return 0;
            };
            let mut delivered = 0;
            let mut failed = Vec::new();
            for handle in bucket.iter() {
                match handle.tx.try_send(text.clone()) {
                    Ok(()) => delivered += 1,
                    Err(e) => {
                        debug!(device_id = %device_id, observer = %handle.id, error = %e, "Observer send failed");
                        failed.push(handle.id);
                    }
                }
            }
            (delivered, failed)
        };

        if !failed.is_empty() {
            if let Some(mut bucket) = self.buckets.get_mut(device_id) {
                bucket.retain(|h| !failed.contains(&h.id));
            }
            self.buckets.remove_if(device_id, |_, bucket| bucket.is_empty());
            warn!(device_id = %device_id, evicted = failed.len(), "Evicted failing observers");
        }

        delivered
    }

    pub fn observer_count(&self, device_id: &str) -> usize {
        self.buckets.get(device_id).map_or(0, |bucket| bucket.len())
    }

    pub fn device_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_publish_evicts_failed_observer() {
        let hub = FanoutHub::new(8);
        let (a, mut rx_a) = hub.new_handle();
        let (b, rx_b) = hub.new_handle();
        hub.connect(a.clone(), "plant1");
        hub.connect(b, "plant1");

        assert_eq!(hub.publish("plant1", EnvelopeType::SensorUpdate, json!({"x": 1})), 2);

        drop(rx_b);
        assert_eq!(hub.publish("plant1", EnvelopeType::SensorUpdate, json!({"x": 2})), 1);
        assert_eq!(hub.observer_count("plant1"), 1);

        assert_eq!(hub.publish("plant1", EnvelopeType::SensorUpdate, json!({"x": 3})), 1);

        let first: Value = serde_json::from_str(&rx_a.recv().await.unwrap()).unwrap();
        assert_eq!(
            first,
            json!({"type": "sensor_update", "plant_id": "plant1", "data": {"x": 1}})
        );
        assert!(hub.disconnect(a.id(), "plant1"));
    }

    #[test]
    fn test_publish_without_bucket_is_noop() {
        let hub = FanoutHub::new(8);
        assert_eq!(hub.publish("plant9", EnvelopeType::TankUpdate, json!({})), 0);
        assert_eq!(hub.device_count(), 0);
    }

    #[test]
    fn test_full_queue_evicts() {
        let hub = FanoutHub::new(1);
        let (slow, _rx) = hub.new_handle();
        hub.connect(slow, "plant1");

        assert_eq!(hub.publish("plant1", EnvelopeType::WateringUpdate, json!({})), 1);
        assert_eq!(hub.publish("plant1", EnvelopeType::WateringUpdate, json!({})), 0);
        assert_eq!(hub.observer_count("plant1"), 0);
        assert_eq!(hub.device_count(), 0);
    }

    #[test]
    fn test_disconnect_deletes_empty_bucket() {
        let hub = FanoutHub::new(4);
        let (a, _rx_a) = hub.new_handle();
        let (b, _rx_b) = hub.new_handle();
        let (a_id, b_id) = (a.id(), b.id());
        hub.connect(a, "plant1");
        hub.connect(b, "plant2");
        assert_eq!(hub.device_count(), 2);

        assert!(hub.disconnect(a_id, "plant1"));
        assert!(!hub.disconnect(a_id, "plant1"));
        assert!(!hub.disconnect(b_id, "plant1"));
        assert_eq!(hub.device_count(), 1);
        assert_eq!(hub.observer_count("plant2"), 1);
    }
}
