//! Classifies inbound topics as `<namespace>/<device_id>/<rest...>` and
//! decodes payloads for the kind the suffix selects.

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::constants::topics;
use crate::ingestion::error::RoutingError;

/// What a topic carries once the device id has been extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Sensor,
    WateringStatus,
    TankStatus,
    /// Our own outbound command seen through the wildcard subscription
    CommandEcho,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub device_id: String,
    pub kind: MessageKind,
}

/// A decoded message ready for the aggregator or the status cache
#[derive(Debug, Clone, PartialEq)]
pub enum RoutedMessage {
    Sensor {
        device_id: String,
        fields: Map<String, Value>,
    },
    WateringStatus {
        device_id: String,
        status: Option<String>,
        is_watering: bool,
    },
    TankStatus {
        device_id: String,
        has_water: bool,
    },
}

impl RoutedMessage {
    pub fn device_id(&self) -> &str {
        match self {
            Self::Sensor { device_id, .. }
            | Self::WateringStatus { device_id, .. }
            | Self::TankStatus { device_id, .. } => device_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WateringStatusPayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    is_watering: bool,
}

#[derive(Debug, Deserialize)]
struct TankStatusPayload {
    has_water: bool,
}

#[derive(Debug, Clone)]
pub struct TopicRouter {
    namespace: String,
    pattern: Regex,
}

impl TopicRouter {
    /// Build a router for `namespace` whose device segment matches `device_pattern`
    pub fn new(namespace: &str, device_pattern: &str) -> Result<Self, RoutingError> {
        let pattern = Regex::new(&format!(
            r"^{}/(?P<device>{})/(?P<rest>.*)$",
            regex::escape(namespace),
            device_pattern
        ))?;

        Ok(Self {
            namespace: namespace.to_string(),
            pattern,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Extract the device id and message kind; `None` means drop
    pub fn route(&self, topic: &str) -> Option<Route> {
        let Some(captures) = self.pattern.captures(topic) else {
            debug!(topic = %topic, "Ignoring message with no device id");
            return None;
        };

        let device_id = captures.name("device")?.as_str().to_string();
        let rest = captures.name("rest").map_or("", |m| m.as_str());

        let kind = if ends_with_segments(rest, topics::WATERING_STATUS_SUFFIX) {
            MessageKind::WateringStatus
        } else if ends_with_segments(rest, topics::TANK_STATUS_SUFFIX) {
            MessageKind::TankStatus
        } else if ends_with_segments(rest, topics::WATERING_COMMAND_SUFFIX) {
            MessageKind::CommandEcho
        } else {
            MessageKind::Sensor
        };

        Some(Route { device_id, kind })
    }

    /// Decode `payload` for an already-routed topic.
    ///
    /// Returns `Ok(None)` for kinds that are recognized but not processed.
    pub fn decode(
        &self,
        topic: &str,
        route: Route,
        payload: &[u8],
    ) -> Result<Option<RoutedMessage>, RoutingError> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| RoutingError::malformed(topic, e.to_string()))?
            .trim();

        let message = match route.kind {
            MessageKind::CommandEcho => return Ok(None),
            MessageKind::Sensor => {
                let value: Value = serde_json::from_str(text)
                    .map_err(|e| RoutingError::malformed(topic, e.to_string()))?;
                let Value::Object(fields) = value else {
                    return Err(RoutingError::malformed(topic, "expected a JSON object"));
                };
                RoutedMessage::Sensor {
                    device_id: route.device_id,
                    fields,
                }
            }
            MessageKind::WateringStatus => {
                let body: WateringStatusPayload = serde_json::from_str(text)
                    .map_err(|e| RoutingError::malformed(topic, e.to_string()))?;
                RoutedMessage::WateringStatus {
                    device_id: route.device_id,
                    status: body.status,
                    is_watering: body.is_watering,
                }
            }
            MessageKind::TankStatus => {
                let body: TankStatusPayload = serde_json::from_str(text)
                    .map_err(|e| RoutingError::malformed(topic, e.to_string()))?;
                RoutedMessage::TankStatus {
                    device_id: route.device_id,
                    has_water: body.has_water,
                }
            }
        };

        Ok(Some(message))
    }

    /// Route and decode in one step
    pub fn parse(&self, topic: &str, payload: &[u8]) -> Result<Option<RoutedMessage>, RoutingError> {
        match self.route(topic) {
            Some(route) => self.decode(topic, route, payload),
            None => Ok(None),
        }
    }
}

/// Suffix match on whole topic segments, so `xtank/status` is not `tank/status`
fn ends_with_segments(rest: &str, suffix: &str) -> bool {
    match rest.strip_suffix(suffix) {
        Some(head) => head.is_empty() || head.ends_with('/'),
        None => false,
    }
}
