#![allow(clippy::doc_markdown)] // Allow technical terms like MQTT, PostgreSQL in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Garden Core
//!
//! Telemetry ingestion, watering decisions and realtime fanout for
//! field-deployed garden sensors.
//!
//! ## Overview
//!
//! Devices publish partial readings over MQTT under
//! `<namespace>/<device_id>/...`. The service reassembles them into complete
//! sensor records, keeps the latest watering and tank status per device,
//! recommends when to water (from a serialized model, or from threshold
//! rules when no model is available), sends watering commands back to the
//! devices and streams every state change to WebSocket observers.
//!
//! ## Architecture
//!
//! ```text
//! broker ──► MqttPump ──► ingest queue ──► IngestionProcessor
//!                                              │
//!                         ┌────────────────────┼─────────────────┐
//!                         ▼                    ▼                 ▼
//!                    Aggregator           StatusCache      (command echo)
//!                         │                    │
//!                         ▼                    ▼
//!              PersistenceGateway ◄──  FanoutHub ──► /ws/{device_id}
//!                         ▲
//!        PredictionService ◄── WateringControl ──► CommandPublisher ──► broker
//! ```
//!
//! ## Module Organization
//!
//! - [`ingestion`] - Topic routing, per-device aggregation, status cache, ingestion worker
//! - [`decision`] - Model-or-rules decision engine and prediction service
//! - [`messaging`] - MQTT connectivity and the command publisher
//! - [`fanout`] - Observer registry and the WebSocket endpoint
//! - [`watering`] - Manual toggles, schedule and prediction-driven runs
//! - [`persistence`] - Storage gateway (in-memory and Postgres)
//! - [`system`] - Component wiring
//! - [`config`] - Layered configuration
//! - [`logging`] - Structured logging setup
//! - [`error`] - Crate-level error type
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use garden_core::config::ConfigManager;
//! use garden_core::messaging::MqttChannel;
//! use garden_core::system::{connect_gateway, GardenSystem};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let config = manager.config().clone();
//!
//! let gateway = connect_gateway(&config).await?;
//! let (channel, pump) = MqttChannel::connect(&config.mqtt);
//! let system = GardenSystem::build(config, gateway, Arc::new(channel))?;
//!
//! let (sink, _worker) = system.start_ingestion();
//! tokio::spawn(pump.run(sink));
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod constants;
pub mod decision;
pub mod error;
pub mod fanout;
pub mod ingestion;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod persistence;
pub mod system;
pub mod watering;

pub use clock::Clock;
pub use config::{ConfigManager, GardenConfig};
pub use decision::{DecisionEngine, DecisionError, PredictionService};
pub use error::{GardenError, Result};
pub use fanout::{EnvelopeType, FanoutHub, ObserverHandle};
pub use ingestion::{Aggregator, IngestionProcessor, StatusCache, TopicRouter};
pub use messaging::{CommandPublisher, CommandTransport, MqttChannel};
pub use models::{
    ActuationEvent, Decision, DeviceBuffer, Prediction, PredictionMethod, SensorRecord, TankState,
    TriggerSource, WateringState,
};
pub use persistence::{InMemoryGateway, PersistenceGateway, PgGateway};
pub use system::GardenSystem;
pub use watering::WateringControl;
