use thiserror::Error;

/// Failures while classifying or decoding an inbound channel message
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("Invalid device pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Malformed payload on {topic}: {message}")]
    MalformedPayload { topic: String, message: String },
}

impl RoutingError {
    pub fn malformed<T: Into<String>, M: Into<String>>(topic: T, message: M) -> Self {
        Self::MalformedPayload {
            topic: topic.into(),
            message: message.into(),
        }
    }
}

/// Failures while merging a telemetry payload into a device buffer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationError {
    #[error("Field {field} for {device_id} is not numeric: {value}")]
    NonNumeric {
        device_id: String,
        field: String,
        value: String,
    },
}

impl AggregationError {
    pub fn non_numeric<D: Into<String>, F: Into<String>, V: Into<String>>(
        device_id: D,
        field: F,
        value: V,
    ) -> Self {
        Self::NonNumeric {
            device_id: device_id.into(),
            field: field.into(),
            value: value.into(),
        }
    }
}
