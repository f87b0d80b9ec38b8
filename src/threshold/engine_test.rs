use std::sync::Arc;

use parking_lot::Mutex;

use super::*;
use crate::test_utils::enable_logger;
use crate::Sample;

/// Listener that records every delivery.
#[derive(Default)]
pub(crate) struct RecordingListener {
    pub events: Mutex<Vec<(ThresholdType, f64, f64)>>,
}

impl RecordingListener {
    fn kinds(&self) -> Vec<ThresholdType> {
        self.events.lock().iter().map(|(kind, _, _)| *kind).collect()
    }
}

impl ThresholdListener for RecordingListener {
    fn notify(
        &self,
        event: &ThresholdEvent,
    ) {
        self.events.lock().push((event.kind, event.bound, event.sample.value));
    }
}

struct PanickyListener;

impl ThresholdListener for PanickyListener {
    fn notify(
        &self,
        _event: &ThresholdEvent,
    ) {
        panic!("listener blew up");
    }
}

fn engine_with(
    low: f64,
    high: f64,
) -> (ThresholdEngine, Arc<RecordingListener>) {
    let engine = ThresholdEngine::new("cpu", ThresholdValues::new(low, high));
    let listener = Arc::new(RecordingListener::default());
    engine.add_listener(listener.clone());
    (engine, listener)
}

fn feed(
    engine: &ThresholdEngine,
    values: &[f64],
) {
    for (i, v) in values.iter().enumerate() {
        engine.evaluate(&Sample::at("cpu", *v, i as i64));
    }
}

#[test]
fn test_breach_and_clear_without_duplicates() {
    enable_logger();
    let (engine, listener) = engine_with(-1.0, 1.0);

    // Values on the bound or already-breached side emit nothing new
    feed(&engine, &[0.0, -1.0, -1.1, -1.0, 0.0]);

    let events = listener.events.lock();
    assert_eq!(
        *events,
        vec![
            (ThresholdType::Breached, -1.0, -1.1),
            (ThresholdType::Cleared, -1.0, 0.0),
        ]
    );
    drop(events);

    let values = engine.threshold_values();
    assert_eq!(values.breached_count, 1);
    assert_eq!(values.cleared_count, 1);
    assert!(!engine.is_breached());
}

#[test]
fn test_crossing_straight_through_emits_clear_then_breach() {
    enable_logger();
    let (engine, listener) = engine_with(0.0, 1.0);

    feed(&engine, &[-1.1, 1.1]);

    assert_eq!(
        listener.kinds(),
        vec![
            ThresholdType::Breached, // low, from the first sample
            ThresholdType::Cleared,
            ThresholdType::Breached, // high, same evaluation as the clear
        ]
    );
    let events = listener.events.lock();
    assert_eq!(events[1], (ThresholdType::Cleared, 0.0, 1.1));
    assert_eq!(events[2], (ThresholdType::Breached, 1.0, 1.1));
}

#[test]
fn test_high_checked_before_low_from_cleared_state() {
    // Misconfigured bounds (low > high) straddle both; high wins
    let (engine, listener) = engine_with(5.0, 1.0);

    feed(&engine, &[3.0]);

    let events = listener.events.lock();
    assert_eq!(*events, vec![(ThresholdType::Breached, 1.0, 3.0)]);
}

#[test]
fn test_step_throttles_repeat_breach_notifications() {
    enable_logger();
    let engine = ThresholdEngine::new("mem", ThresholdValues::new(f64::NAN, 10.0).with_step(5.0));
    let listener = Arc::new(RecordingListener::default());
    engine.add_listener(listener.clone());

    feed(&engine, &[11.0, 13.0, 16.0, 12.0, 9.0]);

    let events = listener.events.lock();
    assert_eq!(
        *events,
        vec![
            (ThresholdType::Breached, 10.0, 11.0), // initial breach
            (ThresholdType::Breached, 10.0, 16.0), // |16 - 11| >= 5
            (ThresholdType::Cleared, 10.0, 9.0),   // clears are never throttled
        ]
    );
    drop(events);

    let values = engine.threshold_values();
    assert_eq!(values.breached_count, 2);
    assert_eq!(values.cleared_count, 1);
    assert_eq!(values.current_high_threshold, 16.0);
}

#[test]
fn test_zero_step_never_renotifies_while_breached() {
    let (engine, listener) = engine_with(f64::NAN, 1.0);

    feed(&engine, &[2.0, 50.0, 1000.0]);

    assert_eq!(listener.kinds(), vec![ThresholdType::Breached]);
}

#[test]
fn test_unset_bounds_never_breach() {
    let engine = ThresholdEngine::new("idle", ThresholdValues::default());
    let listener = Arc::new(RecordingListener::default());
    engine.add_listener(listener.clone());

    feed(&engine, &[f64::MIN, -1.0, 0.0, 1.0, f64::MAX]);

    assert!(listener.events.lock().is_empty());
    assert!(!engine.is_breached());
}

#[test]
fn test_late_listener_sees_only_future_events() {
    let (engine, _first) = engine_with(f64::NAN, 1.0);

    feed(&engine, &[2.0]); // breach happens before the late listener exists

    let late = Arc::new(RecordingListener::default());
    engine.add_listener(late.clone());
    assert!(late.events.lock().is_empty());

    feed(&engine, &[0.5]); // clear is the next event
    assert_eq!(late.kinds(), vec![ThresholdType::Cleared]);
}

#[test]
fn test_listener_registration_is_idempotent() {
    let (engine, listener) = engine_with(f64::NAN, 1.0);

    // Second registration of the same listener is a no-op
    assert!(!engine.add_listener(listener.clone() as Arc<dyn ThresholdListener>));
    feed(&engine, &[2.0]);
    assert_eq!(listener.events.lock().len(), 1);

    let as_dyn: Arc<dyn ThresholdListener> = listener.clone();
    assert!(engine.remove_listener(&as_dyn));
    assert!(!engine.remove_listener(&as_dyn));

    feed(&engine, &[0.0]); // clear after removal goes nowhere
    assert_eq!(listener.events.lock().len(), 1);
}

#[test]
fn test_panicking_listener_is_isolated() {
    enable_logger();
    let engine = ThresholdEngine::new("cpu", ThresholdValues::new(f64::NAN, 1.0));
    engine.add_listener(Arc::new(PanickyListener));
    let survivor = Arc::new(RecordingListener::default());
    engine.add_listener(survivor.clone());

    feed(&engine, &[2.0]);

    assert_eq!(survivor.kinds(), vec![ThresholdType::Breached]);
}

#[test]
fn test_set_threshold_values_replaces_wholesale() {
    let (engine, listener) = engine_with(f64::NAN, 100.0);

    feed(&engine, &[50.0]);
    assert!(listener.events.lock().is_empty());

    engine.set_threshold_values(ThresholdValues::new(f64::NAN, 10.0));
    feed(&engine, &[50.0]);
    assert_eq!(listener.kinds(), vec![ThresholdType::Breached]);
    assert_eq!(engine.threshold_values().high_threshold, 10.0);
}
