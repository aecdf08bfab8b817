use proptest::prelude::*;
use serde_json::{Map, Value};

/// Known telemetry keys plus a few the aggregator must ignore
pub fn field_key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("temperature".to_string()),
        Just("humidity".to_string()),
        Just("soil_moisture".to_string()),
        Just("light_level".to_string()),
        Just("pressure".to_string()),
        Just("battery".to_string()),
        Just("rssi".to_string()),
    ]
}

/// Finite readings, either as JSON numbers or numeric strings
pub fn reading_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-40.0f64..120.0).prop_map(|v| serde_json::json!(v)),
        (0i64..100).prop_map(|v| serde_json::json!(v)),
        (0i64..100).prop_map(|v| Value::String(v.to_string())),
    ]
}

/// A partial telemetry report
pub fn partial_report_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::vec((field_key_strategy(), reading_strategy()), 0..4)
        .prop_map(|pairs| pairs.into_iter().collect())
}

pub fn device_id_strategy() -> impl Strategy<Value = String> {
    (0u32..1000).prop_map(|n| format!("plant{n}"))
}

/// Topic segments that are never device ids under `plant\d+`
pub fn non_device_segment_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,8}".prop_filter("must not look like a device id", |s| !s.starts_with("plant"))
}
