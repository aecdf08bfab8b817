//! # Messaging
//!
//! Broker connectivity. Inbound publishes flow from the [`MqttPump`] into
//! the ingest queue; outbound watering commands go through the
//! [`CommandPublisher`], which depends only on the [`CommandTransport`]
//! trait so it can be exercised without a broker.

pub mod command_publisher;
pub mod mqtt;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use command_publisher::{CommandPublisher, WateringCommand};
pub use mqtt::{AckTracker, MqttChannel, MqttPump, PumpStats};

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("No PUBACK for {topic} within {timeout_ms}ms")]
    AckTimeout { topic: String, timeout_ms: u64 },

    #[error("Connection lost before acknowledgment")]
    ConnectionLost,
}

impl TransportError {
    pub fn ack_timeout<T: Into<String>>(topic: T, timeout: Duration) -> Self {
        Self::AckTimeout {
            topic: topic.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }
}

/// Publishes at-least-once and waits for broker acknowledgment
#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn publish_confirmed(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;
}
