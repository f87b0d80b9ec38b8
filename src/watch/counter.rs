use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::BoundedHistory;
use crate::Result;
use crate::ThresholdEngine;
use crate::Watch;
use crate::WatchPoint;

/// Non-negative accumulator watch.
///
/// `increment`/`decrement` read-modify-write the running count and record
/// the result as one sample; the count lock is held across the whole
/// operation, so concurrent producers compose without losing updates.
/// Decrements saturate at zero.
pub struct CounterWatch {
    watch: Watch,
    count: Mutex<u64>,
}

impl CounterWatch {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        Ok(Self::from_watch(Watch::new(id)?))
    }

    /// Wraps a prepared watch (custom capacity, thresholds).
    pub fn from_watch(watch: Watch) -> Self {
        Self {
            watch,
            count: Mutex::new(0),
        }
    }

    pub fn increment(&self) -> Result<()> {
        self.increment_by(1)
    }

    pub fn increment_by(
        &self,
        amount: u64,
    ) -> Result<()> {
        let mut count = self.count.lock();
        *count = count.saturating_add(amount);
        self.watch.record(*count as f64)
    }

    pub fn decrement(&self) -> Result<()> {
        self.decrement_by(1)
    }

    pub fn decrement_by(
        &self,
        amount: u64,
    ) -> Result<()> {
        let mut count = self.count.lock();
        *count = count.saturating_sub(amount);
        self.watch.record(*count as f64)
    }

    pub fn count(&self) -> u64 {
        *self.count.lock()
    }
}

impl Deref for CounterWatch {
    type Target = Watch;

    fn deref(&self) -> &Self::Target {
        &self.watch
    }
}

impl WatchPoint for CounterWatch {
    fn id(&self) -> &str {
        self.watch.id()
    }

    fn history(&self) -> &Arc<BoundedHistory> {
        self.watch.history()
    }

    fn engine(&self) -> Option<&Arc<ThresholdEngine>> {
        self.watch.engine()
    }

    fn clear(&self) {
        // The accumulator follows the history
        *self.count.lock() = 0;
        self.watch.history().clear();
    }
}
