use async_trait::async_trait;
use garden_core::messaging::{CommandTransport, TransportError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// In-process stand-in for the broker connection
#[derive(Debug, Default)]
pub struct MockTransport {
    published: Mutex<Vec<(String, serde_json::Value)>>,
    unacknowledged: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent publish times out waiting for PUBACK
    pub fn drop_acks(&self, dropping: bool) {
        self.unacknowledged.store(dropping, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<(String, serde_json::Value)> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl CommandTransport for MockTransport {
    async fn publish_confirmed(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let body = serde_json::from_slice(&payload).unwrap_or(serde_json::Value::Null);
        self.published.lock().push((topic.to_string(), body));

        if self.unacknowledged.load(Ordering::SeqCst) {
            Err(TransportError::ack_timeout(topic, Duration::from_millis(10)))
        } else {
            Ok(())
        }
    }
}
