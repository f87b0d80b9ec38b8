use std::sync::Arc;

use super::*;
use crate::constants::DEFAULT_COLLECTION_SIZE;
use crate::constants::MAX_COLLECTION_SIZE;
use crate::test_utils::enable_logger;
use crate::Error;
use crate::LoggingReplicator;
use crate::QueuedReplicator;
use crate::ReplicationConfig;
use crate::WatchError;

fn history_with(capacity: i64) -> BoundedHistory {
    BoundedHistory::with_max_size("load", capacity)
}

#[test]
fn test_snapshot_preserves_insertion_order() {
    enable_logger();
    for n in [1_usize, 2, 7, 10] {
        let history = history_with(10);
        for i in 0..n {
            history.add(Sample::at("load", i as f64, i as i64)).unwrap();
        }
        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), n);
        for (i, sample) in snapshot.iter().enumerate() {
            assert_eq!(sample.value, i as f64);
        }
    }
}

#[test]
fn test_overflow_evicts_oldest_first() {
    enable_logger();
    let history = history_with(5);
    for i in 0..8 {
        history.add(Sample::at("load", i as f64, i as i64)).unwrap();
    }

    let snapshot = history.snapshot();
    assert_eq!(snapshot.len(), 5);
    // 0..3 evicted, 3..8 retained in order
    let values: Vec<f64> = snapshot.iter().map(|s| s.value).collect();
    assert_eq!(values, vec![3.0, 4.0, 5.0, 6.0, 7.0]);
    assert_eq!(history.last().unwrap().value, 7.0);
}

#[test]
fn test_snapshot_range_is_timestamp_inclusive() {
    let history = history_with(100);
    for ts in 10..20 {
        history.add(Sample::at("load", ts as f64, ts)).unwrap();
    }

    let range = history.snapshot_range(12, 15);
    let stamps: Vec<i64> = range.iter().map(|s| s.timestamp_ms).collect();
    assert_eq!(stamps, vec![12, 13, 14, 15]);

    assert!(history.snapshot_range(100, 200).is_empty());
}

#[test]
fn test_clear_empties_buffer_only() {
    let history = history_with(10);
    history.add(Sample::new("load", 1.0)).unwrap();
    history.clear();
    assert!(history.is_empty());
    assert!(history.last().is_none());
    // Still writable after clear
    history.add(Sample::new("load", 2.0)).unwrap();
    assert_eq!(history.len(), 1);
}

#[test]
fn test_set_max_size_round_trip_and_fallback() {
    let history = history_with(10);
    for valid in [1_i64, 10, 500, MAX_COLLECTION_SIZE as i64] {
        history.set_max_size(valid);
        assert_eq!(history.max_size(), valid as usize);
    }
    for invalid in [0_i64, -3, MAX_COLLECTION_SIZE as i64 + 1] {
        history.set_max_size(invalid);
        assert_eq!(history.max_size(), DEFAULT_COLLECTION_SIZE);
    }

    // Construction applies the same policy
    assert_eq!(history_with(-1).max_size(), DEFAULT_COLLECTION_SIZE);
    assert_eq!(history_with(42).max_size(), 42);
}

#[test]
fn test_shrink_keeps_most_recent_entries() {
    let history = history_with(10);
    for i in 0..10 {
        history.add(Sample::at("load", i as f64, i as i64)).unwrap();
    }
    history.set_max_size(3);

    let values: Vec<f64> = history.snapshot().iter().map(|s| s.value).collect();
    assert_eq!(values, vec![7.0, 8.0, 9.0]);
}

#[tokio::test]
async fn test_add_after_close_is_fatal_to_caller() {
    enable_logger();
    let history = history_with(10);
    history.add(Sample::new("load", 1.0)).unwrap();
    history.close().await;
    // Second close is a no-op
    history.close().await;

    let result = history.add(Sample::new("load", 2.0));
    assert!(matches!(
        result,
        Err(Error::Watch(WatchError::HistoryClosed { .. }))
    ));
    // The buffer itself survives close for late readers
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_replicator_set_semantics() {
    enable_logger();
    let history = history_with(10);
    let config = ReplicationConfig::default();
    let pipeline = QueuedReplicator::new("dup", Arc::new(LoggingReplicator), &config);

    assert!(history.add_replicator(pipeline.clone()));
    // Same pipeline twice is a no-op
    assert!(!history.add_replicator(pipeline.clone()));
    assert_eq!(history.replicator_count(), 1);

    assert!(history.remove_replicator(&pipeline));
    assert!(!history.remove_replicator(&pipeline));
    assert_eq!(history.replicator_count(), 0);
}

#[tokio::test]
async fn test_close_detaches_and_closes_pipelines() {
    enable_logger();
    let history = history_with(10);
    let pipeline = QueuedReplicator::new(
        "closing",
        Arc::new(LoggingReplicator),
        &ReplicationConfig::default(),
    );
    history.add_replicator(pipeline.clone());

    history.add(Sample::new("load", 1.0)).unwrap();
    history.close().await;

    assert!(history.is_closed());
    assert!(pipeline.is_closed());
    assert_eq!(history.replicator_count(), 0);
}
