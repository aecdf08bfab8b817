//! # Garden System Bootstrap
//!
//! Wires the ingestion pipeline, decision service, watering control and
//! fanout hub around one set of shared stores. The persistence gateway and
//! the command transport are injected, so the same wiring runs against
//! Postgres and a live broker in production and against in-memory doubles
//! in tests.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::GardenConfig;
use crate::decision::{DecisionEngine, PredictionService};
use crate::error::Result;
use crate::fanout::FanoutHub;
use crate::ingestion::{
    ingest_queue, Aggregator, IngestSender, IngestionProcessor, IngestionStats, StatusCache,
    TopicRouter,
};
use crate::messaging::{CommandPublisher, CommandTransport};
use crate::persistence::{InMemoryGateway, PersistenceGateway, PgGateway};
use crate::watering::{WateringControl, WateringSchedule};

/// Snapshot of the running system
#[derive(Debug, Clone)]
pub struct SystemStatus {
    pub model_loaded: bool,
    pub devices_buffered: usize,
    pub observed_devices: usize,
    pub ingestion: IngestionStats,
}

pub struct GardenSystem {
    config: GardenConfig,
    clock: Clock,
    aggregator: Aggregator,
    status_cache: StatusCache,
    hub: FanoutHub,
    gateway: Arc<dyn PersistenceGateway>,
    predictions: PredictionService,
    publisher: CommandPublisher,
    watering: Arc<WateringControl>,
    processor: Arc<IngestionProcessor>,
}

impl std::fmt::Debug for GardenSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GardenSystem")
            .field("namespace", &self.config.mqtt.namespace)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl GardenSystem {
    /// Build every component from validated configuration.
    ///
    /// The decision engine loads its model here; a failed load leaves it
    /// rule-based for the lifetime of the system.
    pub fn build(
        config: GardenConfig,
        gateway: Arc<dyn PersistenceGateway>,
        transport: Arc<dyn CommandTransport>,
    ) -> Result<Self> {
        config.validate()?;

        let clock = Clock::new(config.time.tz()?);
        let router = TopicRouter::new(&config.mqtt.namespace, &config.mqtt.device_pattern)?;
        let aggregator = Aggregator::new(clock);
        let status_cache = StatusCache::new(clock);
        let hub = FanoutHub::new(config.fanout.observer_buffer_size);

        let engine = Arc::new(DecisionEngine::from_model_path(&config.decision.model_path));
        let predictions = PredictionService::new(engine, Arc::clone(&gateway), clock);
        let publisher = CommandPublisher::new(transport, config.mqtt.namespace.clone());

        let watering = Arc::new(WateringControl::new(
            WateringSchedule::from(&config.watering),
            status_cache.clone(),
            publisher.clone(),
            predictions.clone(),
            Arc::clone(&gateway),
            clock,
        ));

        let processor = Arc::new(IngestionProcessor::new(
            router,
            aggregator.clone(),
            status_cache.clone(),
            Arc::clone(&gateway),
            hub.clone(),
        ));

        info!(
            namespace = %config.mqtt.namespace,
            timezone = %config.time.timezone,
            model_loaded = predictions.engine().uses_model(),
            "Garden system built"
        );

        Ok(Self {
            config,
            clock,
            aggregator,
            status_cache,
            hub,
            gateway,
            predictions,
            publisher,
            watering,
            processor,
        })
    }

    /// Spawn the ingestion worker and return the queue's producer half
    pub fn start_ingestion(&self) -> (IngestSender, JoinHandle<()>) {
        let (sender, rx, monitor) = ingest_queue(self.config.ingestion.queue_buffer_size);
        let worker = tokio::spawn(Arc::clone(&self.processor).run(rx, monitor));
        (sender, worker)
    }

    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            model_loaded: self.predictions.engine().uses_model(),
            devices_buffered: self.aggregator.device_count(),
            observed_devices: self.hub.device_count(),
            ingestion: self.processor.stats(),
        }
    }

    pub fn config(&self) -> &GardenConfig {
        &self.config
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn status_cache(&self) -> &StatusCache {
        &self.status_cache
    }

    pub fn hub(&self) -> &FanoutHub {
        &self.hub
    }

    pub fn gateway(&self) -> Arc<dyn PersistenceGateway> {
        Arc::clone(&self.gateway)
    }

    pub fn predictions(&self) -> &PredictionService {
        &self.predictions
    }

    pub fn publisher(&self) -> &CommandPublisher {
        &self.publisher
    }

    pub fn watering(&self) -> Arc<WateringControl> {
        Arc::clone(&self.watering)
    }

    pub fn processor(&self) -> Arc<IngestionProcessor> {
        Arc::clone(&self.processor)
    }
}

/// Postgres when a database URL is configured, otherwise process memory
pub async fn connect_gateway(config: &GardenConfig) -> Result<Arc<dyn PersistenceGateway>> {
    let clock = Clock::new(config.time.tz()?);

    match &config.database.url {
        Some(url) => {
            let gateway = PgGateway::connect(url, &config.database, clock).await?;
            gateway.ensure_schema().await?;
            Ok(Arc::new(gateway))
        }
        None => {
            warn!(
                retention = config.database.memory_retention,
                "No database URL configured, records are kept in memory only"
            );
            Ok(Arc::new(InMemoryGateway::with_retention(
                config.database.memory_retention,
            )))
        }
    }
}
