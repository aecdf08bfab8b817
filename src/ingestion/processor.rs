//! # Ingestion Worker
//!
//! Consumes the ingest queue in delivery order. For each message:
//!
//! 1. route the topic, dropping anything without a device id
//! 2. decode the payload, dropping malformed JSON
//! 3. sensor telemetry is merged into the aggregator; a completed record is
//!    written through the persistence gateway and published as
//!    `sensor_update` whether or not the write succeeded
//! 4. status messages replace the cached snapshot and are published as
//!    `watering_update` / `tank_update`
//!
//! Nothing here propagates a failure back to the broker connection.

use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::fanout::{EnvelopeType, FanoutHub};
use crate::ingestion::aggregator::Aggregator;
use crate::ingestion::queue::{InboundMessage, QueueMonitor};
use crate::ingestion::status_cache::StatusCache;
use crate::ingestion::topic_router::{RoutedMessage, TopicRouter};
use crate::logging::{log_error, log_ingest_operation};
use crate::models::SensorRecord;
use crate::persistence::PersistenceGateway;

/// Counters readable while the worker runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionStats {
    pub messages_processed: u64,
    pub messages_dropped: u64,
    pub records_emitted: u64,
    pub status_updates: u64,
    pub persistence_failures: u64,
    pub last_message_at: Option<SystemTime>,
}

/// What happened to one inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Dropped,
    Buffered,
    RecordEmitted(SensorRecord),
    StatusUpdated,
    Ignored,
}

pub struct IngestionProcessor {
    router: TopicRouter,
    aggregator: Aggregator,
    status_cache: StatusCache,
    gateway: Arc<dyn PersistenceGateway>,
    hub: FanoutHub,
    stats: Arc<RwLock<IngestionStats>>,
}

impl std::fmt::Debug for IngestionProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionProcessor")
            .field("namespace", &self.router.namespace())
            .field("stats", &*self.stats.read())
            .finish_non_exhaustive()
    }
}

impl IngestionProcessor {
    pub fn new(
        router: TopicRouter,
        aggregator: Aggregator,
        status_cache: StatusCache,
        gateway: Arc<dyn PersistenceGateway>,
        hub: FanoutHub,
    ) -> Self {
        Self {
            router,
            aggregator,
            status_cache,
            gateway,
            hub,
            stats: Arc::new(RwLock::new(IngestionStats::default())),
        }
    }

    pub fn stats(&self) -> IngestionStats {
        self.stats.read().clone()
    }

    /// Consume the queue until every sender is gone
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<InboundMessage>, monitor: QueueMonitor) {
        info!(capacity = monitor.buffer_size(), "Ingestion worker started");

        while let Some(message) = rx.recv().await {
            monitor.record_receive();
            self.handle(message).await;
        }

        info!(stats = ?self.stats(), "Ingestion worker stopped");
    }

    #[instrument(skip(self, message), fields(topic = %message.topic))]
    pub async fn handle(&self, message: InboundMessage) -> IngestOutcome {
        {
            let mut stats = self.stats.write();
            stats.messages_processed += 1;
            stats.last_message_at = Some(SystemTime::now());
        }

        let Some(route) = self.router.route(&message.topic) else {
            self.record_drop();
            return IngestOutcome::Dropped;
        };

        let routed = match self.router.decode(&message.topic, route, &message.payload) {
            Ok(Some(routed)) => routed,
            // Our own command echo
            Ok(None) => return IngestOutcome::Ignored,
            Err(e) => {
                warn!(error = %e, "Discarding malformed message");
                self.record_drop();
                return IngestOutcome::Dropped;
            }
        };

        match routed {
            RoutedMessage::Sensor { device_id, fields } => {
                match self.aggregator.merge(&device_id, &fields) {
                    Ok(Some(record)) => {
                        self.emit_record(&record).await;
                        IngestOutcome::RecordEmitted(record)
                    }
                    Ok(None) => {
                        debug!(device_id = %device_id, "Waiting for remaining mandatory fields");
                        IngestOutcome::Buffered
                    }
                    Err(e) => {
                        warn!(device_id = %device_id, error = %e, "Discarding malformed telemetry");
                        self.record_drop();
                        IngestOutcome::Dropped
                    }
                }
            }
            RoutedMessage::WateringStatus {
                device_id,
                status,
                is_watering,
            } => {
                let state = self
                    .status_cache
                    .update_watering(&device_id, status.as_deref(), is_watering);
                self.publish_status(&device_id, EnvelopeType::WateringUpdate, &state);
                IngestOutcome::StatusUpdated
            }
            RoutedMessage::TankStatus {
                device_id,
                has_water,
            } => {
                let state = self.status_cache.update_tank(&device_id, has_water);
                self.publish_status(&device_id, EnvelopeType::TankUpdate, &state);
                IngestOutcome::StatusUpdated
            }
        }
    }

    async fn emit_record(&self, record: &SensorRecord) {
        self.stats.write().records_emitted += 1;

        match self.gateway.write_sensor_record(record).await {
            Ok(()) => log_ingest_operation(
                "write_sensor_record",
                &record.device_id,
                None,
                "saved",
                None,
            ),
            Err(e) => {
                self.stats.write().persistence_failures += 1;
                log_error(
                    "ingestion",
                    "write_sensor_record",
                    &e.to_string(),
                    Some(&record.device_id),
                );
            }
        }

        self.hub.publish(
            &record.device_id,
            EnvelopeType::SensorUpdate,
            record.update_payload(),
        );
    }

    fn publish_status<T: serde::Serialize>(&self, device_id: &str, kind: EnvelopeType, state: &T) {
        self.stats.write().status_updates += 1;
        match serde_json::to_value(state) {
            Ok(payload) => {
                self.hub.publish(device_id, kind, payload);
            }
            Err(e) => warn!(device_id = %device_id, error = %e, "Failed to encode status snapshot"),
        }
    }

    fn record_drop(&self) {
        self.stats.write().messages_dropped += 1;
    }
}
