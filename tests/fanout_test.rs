mod common;

use std::sync::Arc;

use garden_core::fanout::{EnvelopeType, FanoutHub};
use serde_json::json;

#[tokio::test]
async fn test_failed_observer_is_evicted_after_broadcast() {
    let hub = FanoutHub::new(16);
    let (first, mut first_rx) = hub.new_handle();
    let (second, second_rx) = hub.new_handle();
    hub.connect(first, "plant1");
    hub.connect(second, "plant1");

    assert_eq!(hub.publish("plant1", EnvelopeType::SensorUpdate, json!({"n": 1})), 2);

    // Second observer goes away without disconnecting
    drop(second_rx);
    assert_eq!(hub.publish("plant1", EnvelopeType::SensorUpdate, json!({"n": 2})), 1);
    assert_eq!(hub.observer_count("plant1"), 1);

    assert_eq!(hub.publish("plant1", EnvelopeType::SensorUpdate, json!({"n": 3})), 1);
    assert_eq!(hub.observer_count("plant1"), 1);

    for expected in 1..=3 {
        let text = first_rx.recv().await.unwrap();
        let envelope: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(envelope["data"]["n"], expected);
    }
}

#[tokio::test]
async fn test_devices_do_not_see_each_other() {
    let hub = FanoutHub::new(4);
    let (a, mut a_rx) = hub.new_handle();
    let (b, mut b_rx) = hub.new_handle();
    hub.connect(a, "plant1");
    hub.connect(b, "plant2");

    hub.publish("plant1", EnvelopeType::TankUpdate, json!({"has_water": true}));

    assert!(a_rx.try_recv().is_ok());
    assert!(b_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_concurrent_connect_and_disconnect() {
    let hub = Arc::new(FanoutHub::new(4));
    let mut tasks = Vec::new();

    for i in 0..32 {
        let hub = Arc::clone(&hub);
        tasks.push(tokio::spawn(async move {
            let (handle, rx) = hub.new_handle();
            let id = handle.id();
            hub.connect(handle, "plant1");
            hub.publish("plant1", EnvelopeType::SensorUpdate, json!({"i": i}));
            let removed = hub.disconnect(id, "plant1");
            drop(rx);
            removed
        }));
    }

    for task in tasks {
        // Either this task removed its own handle, or a publish evicted it first
        let _ = task.await.unwrap();
    }

    assert_eq!(hub.observer_count("plant1"), 0);
    assert_eq!(hub.device_count(), 0);
}
