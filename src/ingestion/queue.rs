//! # Ingest Queue
//!
//! Bounded hand-off between the MQTT event-loop pump and the ingestion
//! worker. The pump only ever calls [`IngestSender::send`]; all shared state
//! is touched on the worker side.
//!
//! The [`QueueMonitor`] tracks throughput and samples queue saturation,
//! logging a warning at 80% and a critical warning at 95% of capacity.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A raw publish as delivered by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Queue health derived from saturation
#[derive(Debug, Clone, PartialEq)]
pub enum QueueHealth {
    Healthy,
    Degraded { saturation_percent: f64 },
    Critical { saturation_percent: f64 },
}

impl QueueHealth {
    pub fn from_saturation(saturation: f64) -> Self {
        if saturation >= 0.95 {
            Self::Critical {
                saturation_percent: saturation * 100.0,
            }
        } else if saturation >= 0.80 {
            Self::Degraded {
                saturation_percent: saturation * 100.0,
            }
        } else {
            Self::Healthy
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }
}

/// Point-in-time counters for the queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueMetrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub send_failures: u64,
}

/// Throughput and saturation tracking for the ingest queue
#[derive(Debug, Clone)]
pub struct QueueMonitor {
    queue_name: String,
    buffer_size: usize,
    messages_sent: Arc<AtomicU64>,
    messages_received: Arc<AtomicU64>,
    send_failures: Arc<AtomicU64>,
}

impl QueueMonitor {
    pub fn new(queue_name: impl Into<String>, buffer_size: usize) -> Self {
        let queue_name = queue_name.into();
        info!(queue = %queue_name, buffer_size = buffer_size, "Queue monitor initialized");

        Self {
            queue_name,
            buffer_size,
            messages_sent: Arc::new(AtomicU64::new(0)),
            messages_received: Arc::new(AtomicU64::new(0)),
            send_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Count a successful send.
    ///
    /// Returns `true` when the caller should sample saturation: every ~5% of
    /// the buffer, clamped to 100..=1000 messages.
    pub fn record_send_success(&self) -> bool {
        let count = self.messages_sent.fetch_add(1, Ordering::Relaxed);

        if count > 0 && count % 10_000 == 0 {
            debug!(queue = %self.queue_name, total_sent = count, "Queue throughput milestone");
        }

        let check_interval = (self.buffer_size / 20).clamp(100, 1000) as u64;
        count % check_interval == 0
    }

    pub fn record_receive(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// The receiving side is gone; the message was lost
    pub fn record_send_failure(&self) {
        let failures = self.send_failures.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(queue = %self.queue_name, send_failures = failures, "Ingest queue closed, message lost");
    }

    /// Saturation in 0.0..=1.0, warning above the health thresholds
    pub fn calculate_saturation(&self, available_capacity: usize) -> f64 {
        if self.buffer_size == 0 {
            return 0.0;
        }

        let used = self.buffer_size.saturating_sub(available_capacity);
        let saturation = used as f64 / self.buffer_size as f64;

        if saturation >= 0.95 {
            warn!(
                queue = %self.queue_name,
                saturation_percent = saturation * 100.0,
                available = available_capacity,
                "CRITICAL: ingest queue critically full (>95%)"
            );
        } else if saturation >= 0.80 {
            warn!(
                queue = %self.queue_name,
                saturation_percent = saturation * 100.0,
                available = available_capacity,
                "Ingest queue approaching capacity (>80%)"
            );
        }

        saturation
    }

    pub fn check_health(&self, available_capacity: usize) -> QueueHealth {
        QueueHealth::from_saturation(self.calculate_saturation(available_capacity))
    }

    pub fn metrics(&self) -> QueueMetrics {
        QueueMetrics {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

/// Producer half used by the pump
#[derive(Debug, Clone)]
pub struct IngestSender {
    tx: mpsc::Sender<InboundMessage>,
    monitor: QueueMonitor,
}

impl IngestSender {
    /// Enqueue a message, waiting for capacity when the worker lags.
    ///
    /// Returns `false` once the worker has shut down.
    pub async fn send(&self, message: InboundMessage) -> bool {
        match self.tx.send(message).await {
            Ok(()) => {
                if self.monitor.record_send_success() {
                    self.monitor.calculate_saturation(self.tx.capacity());
                }
                true
            }
            Err(_) => {
                self.monitor.record_send_failure();
                false
            }
        }
    }

    pub fn monitor(&self) -> &QueueMonitor {
        &self.monitor
    }
}

/// Create the bounded ingest queue
pub fn ingest_queue(
    buffer_size: usize,
) -> (IngestSender, mpsc::Receiver<InboundMessage>, QueueMonitor) {
    let (tx, rx) = mpsc::channel(buffer_size);
    let monitor = QueueMonitor::new("ingest_queue", buffer_size);
    (
        IngestSender {
            tx,
            monitor: monitor.clone(),
        },
        rx,
        monitor,
    )
}
