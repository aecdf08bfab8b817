//! # MQTT Channel
//!
//! [`MqttChannel::connect`] splits the broker connection into two halves:
//!
//! - [`MqttChannel`]: the outbound side, publishing commands at QoS 1 and
//!   waiting for the broker's PUBACK
//! - [`MqttPump`]: drives the `rumqttc` event loop, forwards inbound
//!   publishes into the ingest queue and resolves PUBACK waiters
//!
//! The pump never touches aggregation or fanout state.
//!
//! ## Acknowledgment tracking
//!
//! `rumqttc` assigns packet ids inside the event loop, so a publish call does
//! not know its pkid. Publishes are serialized and a FIFO of waiters is kept;
//! each `Outgoing::Publish(pkid)` claims the oldest waiter, and the matching
//! `PubAck(pkid)` resolves it. A pkid already in flight is a retransmission
//! and claims nothing. Waiters are dropped when the event loop errors, so
//! their callers see [`TransportError::ConnectionLost`].
//!
//! Publishes still queued inside the client across a reconnect can claim a
//! waiter registered after the reset; the affected caller then observes an
//! acknowledgment for a neighbouring command.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::oneshot;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::MqttConfig;
use crate::ingestion::{InboundMessage, IngestSender};
use crate::messaging::{CommandTransport, TransportError};

#[derive(Debug, Default)]
struct AckState {
    queued: VecDeque<oneshot::Sender<()>>,
    in_flight: HashMap<u16, oneshot::Sender<()>>,
}

/// Maps PUBACKs back to the publish calls waiting on them
#[derive(Debug, Default)]
pub struct AckTracker {
    state: Mutex<AckState>,
}

impl AckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for the next outgoing publish
    pub fn enqueue(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.state.lock().queued.push_back(tx);
        rx
    }

    /// Withdraw the most recent waiter after its publish was rejected locally
    pub fn cancel_last(&self) {
        self.state.lock().queued.pop_back();
    }

    pub fn on_outgoing_publish(&self, pkid: u16) {
        // QoS 0 publishes carry no packet id and are never acknowledged
        if pkid == 0 {
            return;
        }

        let mut state = self.state.lock();
        if state.in_flight.contains_key(&pkid) {
            debug!(pkid = pkid, "Retransmitted publish");
            return;
        }
        if let Some(waiter) = state.queued.pop_front() {
            state.in_flight.insert(pkid, waiter);
        }
    }

    pub fn on_puback(&self, pkid: u16) {
        let waiter = self.state.lock().in_flight.remove(&pkid);
        if let Some(waiter) = waiter {
            // The caller may have timed out already
            let _ = waiter.send(());
        }
    }

    /// Drop every waiter
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.queued.clear();
        state.in_flight.clear();
    }

    pub fn pending(&self) -> usize {
        let state = self.state.lock();
        state.queued.len() + state.in_flight.len()
    }
}

/// Connection statistics for the pump
#[derive(Debug, Clone, Default)]
pub struct PumpStats {
    pub connected: bool,
    pub connections: u64,
    pub publishes_received: u64,
    pub connection_errors: u64,
    pub last_message_at: Option<SystemTime>,
    pub last_error_at: Option<SystemTime>,
}

/// Outbound half of the broker connection
pub struct MqttChannel {
    client: AsyncClient,
    acks: Arc<AckTracker>,
    publish_lock: tokio::sync::Mutex<()>,
    ack_timeout: Duration,
    stats: Arc<RwLock<PumpStats>>,
}

impl std::fmt::Debug for MqttChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttChannel")
            .field("ack_timeout", &self.ack_timeout)
            .field("pending_acks", &self.acks.pending())
            .finish_non_exhaustive()
    }
}

/// Inbound half: owns the event loop
pub struct MqttPump {
    eventloop: EventLoop,
    client: AsyncClient,
    acks: Arc<AckTracker>,
    subscription: String,
    reconnect_delay: Duration,
    stats: Arc<RwLock<PumpStats>>,
}

impl MqttChannel {
    /// Build the client and event loop.
    ///
    /// Nothing touches the network until the pump is run; the subscription is
    /// (re)issued on every ConnAck.
    pub fn connect(config: &MqttConfig) -> (Self, MqttPump) {
        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| format!("garden-core-{}", Uuid::new_v4()));

        let mut options = MqttOptions::new(client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(config.keep_alive());
        options.set_clean_session(true);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username.clone(), password.clone());
        }

        let (client, eventloop) = AsyncClient::new(options, config.request_capacity);
        let acks = Arc::new(AckTracker::new());
        let stats = Arc::new(RwLock::new(PumpStats::default()));

        info!(
            client_id = %client_id,
            host = %config.host,
            port = config.port,
            subscription = %config.subscription_filter(),
            "MQTT channel configured"
        );

        let channel = Self {
            client: client.clone(),
            acks: Arc::clone(&acks),
            publish_lock: tokio::sync::Mutex::new(()),
            ack_timeout: config.ack_timeout(),
            stats: Arc::clone(&stats),
        };

        let pump = MqttPump {
            eventloop,
            client,
            acks,
            subscription: config.subscription_filter(),
            reconnect_delay: config.reconnect_delay(),
            stats,
        };

        (channel, pump)
    }

    pub fn stats(&self) -> PumpStats {
        self.stats.read().clone()
    }

    pub async fn disconnect(&self) -> Result<(), TransportError> {
        self.client.disconnect().await?;
        Ok(())
    }
}

#[async_trait]
impl CommandTransport for MqttChannel {
    #[instrument(skip(self, payload), fields(bytes = payload.len()))]
    async fn publish_confirmed(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let ack = {
            let _serialized = self.publish_lock.lock().await;
            let ack = self.acks.enqueue();
            if let Err(e) = self
                .client
                .publish(topic, QoS::AtLeastOnce, false, payload)
                .await
            {
                self.acks.cancel_last();
                return Err(e.into());
            }
            ack
        };

        match tokio::time::timeout(self.ack_timeout, ack).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(TransportError::ConnectionLost),
            Err(_) => Err(TransportError::ack_timeout(topic, self.ack_timeout)),
        }
    }
}

impl MqttPump {
    pub fn stats_handle(&self) -> Arc<RwLock<PumpStats>> {
        Arc::clone(&self.stats)
    }

    /// Drive the event loop until the ingest queue closes
    pub async fn run(mut self, sink: IngestSender) {
        info!(subscription = %self.subscription, "MQTT pump started");

        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    {
                        let mut stats = self.stats.write();
                        stats.publishes_received += 1;
                        stats.last_message_at = Some(SystemTime::now());
                    }
                    let message = InboundMessage::new(publish.topic, publish.payload.to_vec());
                    if !sink.send(message).await {
                        warn!("Ingest queue closed, stopping MQTT pump");
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    {
                        let mut stats = self.stats.write();
                        stats.connected = true;
                        stats.connections += 1;
                    }
                    info!(subscription = %self.subscription, "Connected to MQTT broker");
                    if let Err(e) = self
                        .client
                        .try_subscribe(self.subscription.clone(), QoS::AtLeastOnce)
                    {
                        error!(error = %e, "Failed to queue subscription");
                    }
                }
                Ok(Event::Incoming(Packet::PubAck(ack))) => self.acks.on_puback(ack.pkid),
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    debug!(subscription = %self.subscription, "Subscription acknowledged");
                }
                Ok(Event::Outgoing(Outgoing::Publish(pkid))) => self.acks.on_outgoing_publish(pkid),
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    info!("MQTT disconnect requested, stopping pump");
                    self.stats.write().connected = false;
                    self.acks.reset();
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    {
                        let mut stats = self.stats.write();
                        stats.connected = false;
                        stats.connection_errors += 1;
                        stats.last_error_at = Some(SystemTime::now());
                    }
                    self.acks.reset();
                    warn!(
                        error = %e,
                        retry_in_ms = self.reconnect_delay.as_millis() as u64,
                        "MQTT connection error"
                    );
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }
}
