mod common;

use common::strategies::*;
use garden_core::decision::rule_based;
use garden_core::ingestion::{Aggregator, MessageKind, TopicRouter};
use garden_core::models::SensorField;
use garden_core::Clock;
use proptest::prelude::*;

proptest! {
    /// Property: a record is emitted exactly when the mandatory trio has been seen
    #[test]
    fn records_emitted_iff_trio_present(reports in prop::collection::vec(partial_report_strategy(), 1..12)) {
        let aggregator = Aggregator::new(Clock::default());
        let mut seen = std::collections::HashSet::new();

        for report in &reports {
            for key in report.keys() {
                if let Some(field) = SensorField::from_key(key) {
                    seen.insert(field);
                }
            }
            let emitted = aggregator.merge("plant1", report).unwrap();
            let complete = SensorField::MANDATORY.iter().all(|f| seen.contains(f));
            prop_assert_eq!(emitted.is_some(), complete);
        }
    }

    /// Property: the emitted record always carries the latest value of each field
    #[test]
    fn record_reflects_latest_values(reports in prop::collection::vec(partial_report_strategy(), 1..12)) {
        let aggregator = Aggregator::new(Clock::default());
        let mut latest = std::collections::HashMap::new();

        for report in &reports {
            for (key, value) in report {
                if SensorField::from_key(key).is_some() {
                    let number = match value {
                        serde_json::Value::String(s) => s.parse::<f64>().unwrap(),
                        other => other.as_f64().unwrap(),
                    };
                    latest.insert(key.clone(), number);
                }
            }
            if let Some(record) = aggregator.merge("plant1", report).unwrap() {
                prop_assert_eq!(Some(&record.temperature), latest.get("temperature"));
                prop_assert_eq!(Some(&record.humidity), latest.get("humidity"));
                prop_assert_eq!(Some(&record.soil_moisture), latest.get("soil_moisture"));
                prop_assert_eq!(record.light_level.as_ref(), latest.get("light_level"));
            }
        }
    }

    /// Property: device topics route to the device named in them
    #[test]
    fn device_topics_route_to_their_device(device in device_id_strategy(), rest in "[a-z]{1,8}(/[a-z]{1,8}){0,2}") {
        let router = TopicRouter::new("garden", r"plant\d+").unwrap();
        let topic = format!("garden/{device}/{rest}");
        let route = router.route(&topic).unwrap();
        prop_assert_eq!(route.device_id, device);
    }

    /// Property: topics without a device segment never route
    #[test]
    fn non_device_topics_are_dropped(segment in non_device_segment_strategy(), rest in "[a-z]{1,8}") {
        let router = TopicRouter::new("garden", r"plant\d+").unwrap();
        let nested_topic = format!("garden/{segment}/{rest}");
        let bare_topic = format!("garden/{segment}");
        prop_assert!(router.route(&nested_topic).is_none());
        prop_assert!(router.route(&bare_topic).is_none());
    }

    /// Property: status suffixes win over the sensor default at any depth
    #[test]
    fn status_suffix_classification(device in device_id_strategy(), prefix in "([a-z]{1,6}/){0,2}") {
        let router = TopicRouter::new("garden", r"plant\d+").unwrap();
        let tank = router.route(&format!("garden/{device}/{prefix}tank/status")).unwrap();
        prop_assert_eq!(tank.kind, MessageKind::TankStatus);
        let watering = router.route(&format!("garden/{device}/{prefix}watering/status")).unwrap();
        prop_assert_eq!(watering.kind, MessageKind::WateringStatus);
    }

    /// Property: rule decisions follow the dry-soil thresholds and fixed confidences
    #[test]
    fn rule_decisions_match_thresholds(soil in 0.0f64..100.0, humidity in 0.0f64..100.0) {
        let decision = rule_based(soil, humidity);
        let dry = soil < 30.0 || humidity < 35.0;
        prop_assert_eq!(decision.should_water, dry);
        prop_assert_eq!(decision.confidence, if dry { 0.70 } else { 0.60 });
        prop_assert!(decision.method.is_rule_based());
    }
}
