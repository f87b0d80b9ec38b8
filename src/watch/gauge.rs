use std::ops::Deref;
use std::sync::Arc;

use crate::BoundedHistory;
use crate::Result;
use crate::ThresholdEngine;
use crate::Watch;
use crate::WatchPoint;

/// Watch for arbitrary signed readings recorded directly by the producer.
pub struct GaugeWatch {
    watch: Watch,
}

impl GaugeWatch {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        Ok(Self::from_watch(Watch::new(id)?))
    }

    /// Wraps a prepared watch (custom capacity, thresholds).
    pub fn from_watch(watch: Watch) -> Self {
        Self { watch }
    }

    pub fn record(
        &self,
        value: f64,
    ) -> Result<()> {
        self.watch.record(value)
    }

    pub fn record_with_detail(
        &self,
        value: f64,
        detail: impl Into<String>,
    ) -> Result<()> {
        self.watch.record_with_detail(value, detail)
    }
}

impl Deref for GaugeWatch {
    type Target = Watch;

    fn deref(&self) -> &Self::Target {
        &self.watch
    }
}

impl WatchPoint for GaugeWatch {
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
