use std::path::PathBuf;
use std::sync::Arc;

use garden_core::config::GardenConfig;
use garden_core::ingestion::InboundMessage;
use garden_core::models::SensorRecord;
use garden_core::persistence::InMemoryGateway;
use garden_core::{Clock, GardenSystem};

use super::MockTransport;

pub const NAMESPACE: &str = "garden";

/// Configuration pointing at a model file that does not exist
pub fn test_config() -> GardenConfig {
    let mut config = GardenConfig::default();
    config.mqtt.namespace = NAMESPACE.to_string();
    config.time.timezone = "UTC".to_string();
    config.decision.model_path = PathBuf::from("/nonexistent/watering_model.json");
    config
}

pub struct TestSystem {
    pub system: GardenSystem,
    pub gateway: Arc<InMemoryGateway>,
    pub transport: Arc<MockTransport>,
}

pub fn build_system(config: GardenConfig) -> TestSystem {
    let gateway = Arc::new(InMemoryGateway::new());
    let transport = Arc::new(MockTransport::new());
    let system = GardenSystem::build(config, gateway.clone(), transport.clone())
        .expect("test configuration is valid");
    TestSystem {
        system,
        gateway,
        transport,
    }
}

pub fn sensor_message(device_id: &str, body: serde_json::Value) -> InboundMessage {
    InboundMessage::new(
        format!("{NAMESPACE}/{device_id}/sensors"),
        body.to_string(),
    )
}

pub fn status_message(device_id: &str, suffix: &str, body: serde_json::Value) -> InboundMessage {
    InboundMessage::new(format!("{NAMESPACE}/{device_id}/{suffix}"), body.to_string())
}

pub fn sensor_record(device_id: &str, soil_moisture: f64, humidity: f64, temperature: f64) -> SensorRecord {
    SensorRecord {
        device_id: device_id.to_string(),
        timestamp: Clock::default().now(),
        temperature,
        humidity,
        soil_moisture,
        light_level: None,
        pressure: None,
    }
}
