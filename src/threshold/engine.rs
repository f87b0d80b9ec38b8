use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use tracing::error;

use crate::metrics::THRESHOLD_EVENTS;
use crate::Sample;
use crate::ThresholdType;
use crate::ThresholdValues;

/// Direction of an active breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreachDirection {
    Low,
    High,
}

/// One threshold crossing, delivered synchronously on the recording
/// thread.
#[derive(Debug, Clone)]
pub struct ThresholdEvent {
    pub watch_id: String,
    pub sample: Sample,
    pub kind: ThresholdType,
    /// The configured bound that was crossed (breach) or re-entered
    /// (clear)
    pub bound: f64,
}

impl ThresholdEvent {
    /// Human-readable line for display layers.
    pub fn detail(&self) -> String {
        format!(
            "watch '{}' {} threshold {} with value {} at {}",
            self.watch_id, self.kind, self.bound, self.sample.value, self.sample.timestamp_ms
        )
    }
}

/// Observer of threshold crossings for one watch id.
///
/// Notification happens on the producer's recording thread; implementations
/// must not call back into the engine that is notifying them.
pub trait ThresholdListener: Send + Sync + 'static {
    fn notify(
        &self,
        event: &ThresholdEvent,
    );
}

struct EngineState {
    values: ThresholdValues,
    direction: Option<BreachDirection>,
}

/// Breach/clear state machine for one watch.
///
/// Consumes one sample at a time and emits zero, one or two events
/// (clear-then-breach when a value crosses straight through both bounds).
/// Evaluation for a single engine is serialized, including listener
/// notification; engines of different watches run independently.
///
/// Bound comparisons are strict: a value sitting exactly on a bound
/// neither breaches nor clears. From the cleared state the high bound is
/// checked before the low bound.
pub struct ThresholdEngine {
    watch_id: String,
    state: Mutex<EngineState>,
    listeners: Mutex<Vec<Arc<dyn ThresholdListener>>>,
}

impl ThresholdEngine {
    pub fn new(
        watch_id: impl Into<String>,
        values: ThresholdValues,
    ) -> Self {
        Self {
            watch_id: watch_id.into(),
            state: Mutex::new(EngineState {
                values,
                direction: None,
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn watch_id(&self) -> &str {
        &self.watch_id
    }

    /// Registers a listener for future events only; past breaches are
    /// never replayed. Returns false when the same listener is already
    /// registered.
    pub fn add_listener(
        &self,
        listener: Arc<dyn ThresholdListener>,
    ) -> bool {
        let mut listeners = self.listeners.lock();
        if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Deregisters a listener; delivery stops immediately. Idempotent.
    pub fn remove_listener(
        &self,
        listener: &Arc<dyn ThresholdListener>,
    ) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Replaces the threshold values wholesale. Breach direction is kept;
    /// the next evaluation reconciles state against the new bounds.
    pub fn set_threshold_values(
        &self,
        values: ThresholdValues,
    ) {
        self.state.lock().values = values;
    }

    /// Snapshot of the current values and counters.
    pub fn threshold_values(&self) -> ThresholdValues {
        self.state.lock().values.clone()
    }

    pub fn is_breached(&self) -> bool {
        self.state.lock().direction.is_some()
    }

    /// Runs the transition function for one sample and notifies listeners
    /// synchronously, in registration order, on the calling thread.
    pub fn evaluate(
        &self,
        sample: &Sample,
    ) {
        let mut state = self.state.lock();
        let events = Self::transition(&self.watch_id, &mut state, sample);
        if events.is_empty() {
            return;
        }

        for event in &events {
            debug!("{}", event.detail());
            THRESHOLD_EVENTS
                .with_label_values(&[&self.watch_id, &event.kind.to_string()])
                .inc();
        }

        // Evaluation stays serialized through notification: the state lock
        // is held until every listener has run.
        let listeners = self.listeners.lock().clone();
        for event in &events {
            for listener in &listeners {
                if let Err(panic) = catch_unwind(AssertUnwindSafe(|| listener.notify(event))) {
                    // One bad listener never starves the rest
                    error!("threshold listener for '{}' panicked: {:?}", self.watch_id, panic);
                }
            }
        }
    }

    fn transition(
        watch_id: &str,
        state: &mut EngineState,
        sample: &Sample,
    ) -> Vec<ThresholdEvent> {
        let v = sample.value;
        let mut events = Vec::new();

        let breach = |state: &mut EngineState, events: &mut Vec<ThresholdEvent>, direction: BreachDirection| {
            state.values.breached_count += 1;
            let bound = match direction {
                BreachDirection::High => {
                    state.values.current_high_threshold = v;
                    state.values.high_threshold
                }
                BreachDirection::Low => {
                    state.values.current_low_threshold = v;
                    state.values.low_threshold
                }
            };
            state.direction = Some(direction);
            events.push(ThresholdEvent {
                watch_id: watch_id.to_string(),
                sample: sample.clone(),
                kind: ThresholdType::Breached,
                bound,
            });
        };

        match state.direction {
            None => {
                if state.values.high_is_set() && v > state.values.high_threshold {
                    breach(state, &mut events, BreachDirection::High);
                } else if state.values.low_is_set() && v < state.values.low_threshold {
                    breach(state, &mut events, BreachDirection::Low);
                }
            }
            Some(BreachDirection::High) => {
                if v < state.values.high_threshold {
                    state.values.cleared_count += 1;
                    state.direction = None;
                    events.push(ThresholdEvent {
                        watch_id: watch_id.to_string(),
                        sample: sample.clone(),
                        kind: ThresholdType::Cleared,
                        bound: state.values.high_threshold,
                    });
                    // Crossing straight through: the low bound gets its
                    // turn in the same evaluation
                    if state.values.low_is_set() && v < state.values.low_threshold {
                        breach(state, &mut events, BreachDirection::Low);
                    }
                } else if v > state.values.high_threshold {
                    let step = state.values.step;
                    if step > 0.0 && (v - state.values.current_high_threshold).abs() >= step {
                        breach(state, &mut events, BreachDirection::High);
                    }
                }
            }
            Some(BreachDirection::Low) => {
                if v > state.values.low_threshold {
                    state.values.cleared_count += 1;
                    state.direction = None;
                    events.push(ThresholdEvent {
                        watch_id: watch_id.to_string(),
                        sample: sample.clone(),
                        kind: ThresholdType::Cleared,
                        bound: state.values.low_threshold,
                    });
                    if state.values.high_is_set() && v > state.values.high_threshold {
                        breach(state, &mut events, BreachDirection::High);
                    }
                } else if v < state.values.low_threshold {
                    let step = state.values.step;
                    if step > 0.0 && (v - state.values.current_low_threshold).abs() >= step {
                        breach(state, &mut events, BreachDirection::Low);
                    }
                }
            }
        }

        events
    }
}

impl std::fmt::Debug for ThresholdEngine {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ThresholdEngine")
            .field("watch_id", &self.watch_id)
            .field("breached", &self.is_breached())
            .finish()
    }
}
