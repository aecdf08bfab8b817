use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::constants::topics;
use crate::messaging::CommandTransport;

/// Wire format of `<namespace>/<device_id>/watering/command`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WateringCommand {
    pub status: bool,
    pub duration: u32,
}

/// Sends watering commands to devices
#[derive(Clone)]
pub struct CommandPublisher {
    transport: Arc<dyn CommandTransport>,
    namespace: String,
}

impl std::fmt::Debug for CommandPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandPublisher")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl CommandPublisher {
    pub fn new(transport: Arc<dyn CommandTransport>, namespace: impl Into<String>) -> Self {
        Self {
            transport,
            namespace: namespace.into(),
        }
    }

    pub fn command_topic(&self, device_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.namespace,
            device_id,
            topics::WATERING_COMMAND_SUFFIX
        )
    }

    /// Publish a command; `true` only once the broker acknowledged it
    pub async fn send_command(&self, device_id: &str, status: bool, duration_seconds: u32) -> bool {
        let topic = self.command_topic(device_id);
        let command = WateringCommand {
            status,
            duration: duration_seconds,
        };

        let payload = match serde_json::to_vec(&command) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(device_id = %device_id, error = %e, "Failed to serialize watering command");
                return false;
            }
        };

        match self.transport.publish_confirmed(&topic, payload).await {
            Ok(()) => {
                info!(
                    device_id = %device_id,
                    topic = %topic,
                    status = status,
                    duration_seconds = duration_seconds,
                    "Watering command acknowledged"
                );
                true
            }
            Err(e) => {
                warn!(
                    device_id = %device_id,
                    topic = %topic,
                    error = %e,
                    "Watering command not delivered"
                );
                false
            }
        }
    }
}
