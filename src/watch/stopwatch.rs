use std::ops::Deref;
use std::sync::Arc;
use std::thread;
use std::thread::ThreadId;

use dashmap::DashMap;

use crate::utils::now_ms;
use crate::BoundedHistory;
use crate::Result;
use crate::ThresholdEngine;
use crate::Watch;
use crate::WatchError;
use crate::WatchPoint;

/// Elapsed-time watch.
///
/// Each calling thread runs its own independent start/stop pair against a
/// per-thread start table; the recorded history is shared. `start` on a
/// thread with a measurement already open simply restarts it.
pub struct StopWatch {
    watch: Watch,
    starts: DashMap<ThreadId, i64>,
}

impl StopWatch {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        Ok(Self::from_watch(Watch::new(id)?))
    }

    /// Wraps a prepared watch (custom capacity, thresholds).
    pub fn from_watch(watch: Watch) -> Self {
        Self {
            watch,
            starts: DashMap::new(),
        }
    }

    /// Marks the start of a measurement for the calling thread.
    pub fn start(&self) {
        self.starts.insert(thread::current().id(), now_ms());
    }

    /// Records the elapsed milliseconds since this thread's `start`.
    ///
    /// # Errors
    /// [`WatchError::StopWithoutStart`] when the calling thread has no
    /// open measurement.
    pub fn stop(&self) -> Result<()> {
        let (_, started) = self
            .starts
            .remove(&thread::current().id())
            .ok_or_else(|| WatchError::StopWithoutStart {
                id: self.watch.id().to_string(),
            })?;
        let elapsed = (now_ms() - started).max(0) as f64;
        self.watch.record(elapsed)
    }
}

impl Deref for StopWatch {
    type Target = Watch;

    fn deref(&self) -> &Self::Target {
        &self.watch
    }
}

impl WatchPoint for StopWatch {
    fn id(&self) -> &str {
        self.watch.id()
    }

    fn history(&self) -> &Arc<BoundedHistory> {
        self.watch.history()
    }

    fn engine(&self) -> Option<&Arc<ThresholdEngine>> {
        self.watch.engine()
    }
}
