mod common;

use common::*;
use garden_core::models::TriggerSource;
use garden_core::persistence::PersistenceGateway;
use garden_core::watering::WateringError;
use serde_json::json;
use tokio_test::assert_ok;

#[tokio::test]
async fn test_toggle_on_records_manual_event_and_sends_command() {
    let test = build_system(test_config());
    let control = test.system.watering();

    let outcome = control.toggle("plant1", true, 15).await.unwrap();
    assert!(outcome.command_sent);
    assert_eq!(outcome.duration_seconds, 15);

    let published = test.transport.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "garden/plant1/watering/command");
    assert_eq!(published[0].1, json!({"status": true, "duration": 15}));

    let events = test.gateway.actuation_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].triggered_by, TriggerSource::Manual);
    assert_eq!(events[0].duration_seconds, 15);
}

#[tokio::test]
async fn test_toggle_records_event_even_without_ack() {
    let test = build_system(test_config());
    test.transport.drop_acks(true);

    let outcome = test.system.watering().toggle("plant1", true, 10).await.unwrap();
    assert!(!outcome.command_sent);
    assert_eq!(test.gateway.actuation_events().len(), 1);
}

#[tokio::test]
async fn test_toggle_off_records_nothing() {
    let test = build_system(test_config());
    let outcome = test.system.watering().toggle("plant1", false, 0).await.unwrap();
    assert!(outcome.command_sent);
    assert!(!outcome.status);
    assert!(test.gateway.actuation_events().is_empty());
}

#[tokio::test]
async fn test_toggle_rejects_excessive_duration() {
    let test = build_system(test_config());
    let err = test.system.watering().toggle("plant1", true, 601).await.unwrap_err();
    assert!(matches!(err, WateringError::Invalid(_)));
    assert!(test.transport.published().is_empty());
}

#[tokio::test]
async fn test_status_reads_device_state() {
    let test = build_system(test_config());
    let control = test.system.watering();

    let report = control.status("plant1");
    assert!(!report.active);
    assert_eq!(report.device_status, "unknown");
    assert!(report.last_update.is_none());

    // A manual toggle alone does not flip the reported state
    control.toggle("plant1", true, 10).await.unwrap();
    assert!(!control.status("plant1").active);

    test.system
        .status_cache()
        .update_watering("plant1", Some("watering"), true);
    let report = control.status("plant1");
    assert!(report.active);
    assert_eq!(report.device_status, "watering");
    assert!(report.schedule.enabled);
}

#[tokio::test]
async fn test_schedule_update() {
    let test = build_system(test_config());
    let control = test.system.watering();

    let schedule = control.update_schedule(false, 20, 40).unwrap();
    assert_eq!(control.schedule(), schedule);
    assert!(!control.status("plant1").schedule.enabled);

    assert!(control.update_schedule(true, 0, 40).is_err());
    assert_eq!(control.schedule(), schedule);
}

#[tokio::test]
async fn test_evaluate_dispatches_when_dry_and_enabled() {
    let test = build_system(test_config());
    assert_ok!(
        test.gateway
            .write_sensor_record(&sensor_record("plant1", 20.0, 50.0, 24.0))
            .await
    );

    let evaluation = test.system.watering().evaluate("plant1").await.unwrap();
    assert!(evaluation.prediction.should_water);
    assert_eq!(evaluation.command_sent, Some(true));

    let events = test.gateway.actuation_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].triggered_by, TriggerSource::MlPrediction);
    assert_eq!(events[0].duration_seconds, 10);
    assert_eq!(test.gateway.predictions().len(), 1);
}

#[tokio::test]
async fn test_evaluate_skips_dispatch_when_disabled_or_wet() {
    let test = build_system(test_config());
    let control = test.system.watering();
    assert_ok!(
        test.gateway
            .write_sensor_record(&sensor_record("plant1", 20.0, 50.0, 24.0))
            .await
    );

    control.update_schedule(false, 10, 30).unwrap();
    let evaluation = control.evaluate("plant1").await.unwrap();
    assert!(evaluation.prediction.should_water);
    assert_eq!(evaluation.command_sent, None);

    control.update_schedule(true, 10, 30).unwrap();
    assert_ok!(
        test.gateway
            .write_sensor_record(&sensor_record("plant2", 70.0, 70.0, 24.0))
            .await
    );
    let evaluation = control.evaluate("plant2").await.unwrap();
    assert!(!evaluation.prediction.should_water);
    assert_eq!(evaluation.command_sent, None);

    assert!(test.transport.published().is_empty());
    assert!(test.gateway.actuation_events().is_empty());
}

#[tokio::test]
async fn test_evaluate_without_data() {
    let test = build_system(test_config());
    let err = test.system.watering().evaluate("plant9").await.unwrap_err();
    assert!(matches!(err, WateringError::Decision(_)));
}

#[tokio::test]
async fn test_history_is_newest_first() {
    let test = build_system(test_config());
    let control = test.system.watering();
    control.toggle("plant1", true, 5).await.unwrap();
    control.toggle("plant2", true, 7).await.unwrap();

    let history = control.history(10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].timestamp >= history[1].timestamp);
}

#[tokio::test]
async fn test_readings_are_newest_first_per_device() {
    let test = build_system(test_config());
    let base = sensor_record("plant1", 10.0, 50.0, 24.0);
    for (offset, soil) in [(0, 10.0), (2, 12.0), (1, 11.0)] {
        let mut record = sensor_record("plant1", soil, 50.0, 24.0);
        record.timestamp = base.timestamp + chrono::Duration::seconds(offset);
        assert_ok!(test.gateway.write_sensor_record(&record).await);
    }
    assert_ok!(
        test.gateway
            .write_sensor_record(&sensor_record("plant2", 90.0, 50.0, 24.0))
            .await
    );

    let readings = test.system.watering().readings("plant1", 2).await.unwrap();
    let soils: Vec<f64> = readings.iter().map(|r| r.soil_moisture).collect();
    assert_eq!(soils, vec![12.0, 11.0]);
    assert!(readings.iter().all(|r| r.device_id == "plant1"));

    assert!(test.system.watering().readings("plant9", 5).await.unwrap().is_empty());
}
