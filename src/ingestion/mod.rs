//! # Ingestion Pipeline
//!
//! Everything between the broker connection and the fanout hub: topic
//! routing, per-device aggregation, the status cache and the worker that
//! drives them from the bounded ingest queue.

pub mod aggregator;
pub mod error;
pub mod processor;
pub mod queue;
pub mod status_cache;
pub mod topic_router;

pub use aggregator::{Aggregator, BufferStore};
pub use error::{AggregationError, RoutingError};
pub use processor::{IngestOutcome, IngestionProcessor, IngestionStats};
pub use queue::{ingest_queue, InboundMessage, IngestSender, QueueHealth, QueueMetrics, QueueMonitor};
pub use status_cache::StatusCache;
pub use topic_router::{MessageKind, Route, RoutedMessage, TopicRouter};
