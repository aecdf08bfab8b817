//! Realtime fanout of device state changes to connected observers.

pub mod hub;
pub mod ws;

pub use hub::{Envelope, EnvelopeType, FanoutHub, ObserverHandle};
pub use ws::router;
