use super::*;

fn create_test_registry() -> Registry {
    let registry = Registry::new_custom(Some("vigil".to_string()), None).unwrap();
    register_custom_metrics(&registry);
    registry
}

#[test]
fn test_custom_registry() {
    let registry = create_test_registry();

    SAMPLES_RECORDED.with_label_values(&["cpu"]).inc();
    let metrics = &registry.gather();
    assert!(!metrics.is_empty());

    let metric_names: Vec<_> = metrics.iter().map(|m| m.get_name()).collect();
    assert!(
        metric_names.contains(&"vigil_samples_recorded"),
        "Missing vigil_samples_recorded"
    );
    assert!(
        metric_names.contains(&"vigil_threshold_events"),
        "Missing vigil_threshold_events"
    );
}

#[test]
fn test_counter_increment() {
    // Reset the counter to avoid test pollution
    REPLICATION_FAILURES.reset();

    REPLICATION_FAILURES.with_label_values(&["file-sink"]).inc();
    REPLICATION_FAILURES.with_label_values(&["file-sink"]).inc();

    let value = REPLICATION_FAILURES.with_label_values(&["file-sink"]).get();
    assert_eq!(value, 2, "Counter should increment correctly");
}

#[test]
fn test_queue_depth_gauge_moves_both_ways() {
    REPLICATION_QUEUE_DEPTH.reset();

    let gauge = REPLICATION_QUEUE_DEPTH.with_label_values(&["file-sink"]);
    gauge.inc();
    gauge.inc();
    gauge.dec();
    assert_eq!(gauge.get(), 1.0);

    gauge.set(0.0);
    assert_eq!(gauge.get(), 0.0);
}
