use serde::Deserialize;
use serde::Serialize;

/// Kind of a threshold crossing event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdType {
    Breached,
    Cleared,
}

impl std::fmt::Display for ThresholdType {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ThresholdType::Breached => write!(f, "breached"),
            ThresholdType::Cleared => write!(f, "cleared"),
        }
    }
}

/// Configured bounds plus the mutable breach bookkeeping for one watch.
///
/// A `NAN` bound means "unset": that side never breaches. `step` is the
/// hysteresis delta: while continuously breached in one direction, a new
/// notification fires only when the value has moved at least `step` away
/// from the value that caused the previous notification. The step never
/// throttles clears.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdValues {
    pub low_threshold: f64,
    pub high_threshold: f64,
    /// Last value that caused a low breach notification
    pub current_low_threshold: f64,
    /// Last value that caused a high breach notification
    pub current_high_threshold: f64,
    pub step: f64,
    pub breached_count: u64,
    pub cleared_count: u64,
}

impl Default for ThresholdValues {
    fn default() -> Self {
        Self {
            low_threshold: f64::NAN,
            high_threshold: f64::NAN,
            current_low_threshold: f64::NAN,
            current_high_threshold: f64::NAN,
            step: 0.0,
            breached_count: 0,
            cleared_count: 0,
        }
    }
}

impl ThresholdValues {
    /// Bounds without hysteresis. Pass `f64::NAN` for an unset side.
    pub fn new(
        low_threshold: f64,
        high_threshold: f64,
    ) -> Self {
        Self {
            low_threshold,
            high_threshold,
            ..Default::default()
        }
    }

    /// Adds a hysteresis step; negative values are treated as zero.
    pub fn with_step(
        mut self,
        step: f64,
    ) -> Self {
        self.step = step.max(0.0);
        self
    }

    pub fn low_is_set(&self) -> bool {
        !self.low_threshold.is_nan()
    }

    pub fn high_is_set(&self) -> bool {
        !self.high_threshold.is_nan()
    }
}
