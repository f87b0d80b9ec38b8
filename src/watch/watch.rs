use std::sync::Arc;

use parking_lot::RwLock;

use crate::BoundedHistory;
use crate::Result;
use crate::Sample;
use crate::ThresholdEngine;
use crate::ThresholdListener;
use crate::ThresholdValues;
use crate::WatchError;

/// The registerable face of a watch: what the management and display
/// layers get to see, and what the registry stores.
pub trait WatchPoint: Send + Sync + 'static {
    fn id(&self) -> &str;

    fn history(&self) -> &Arc<BoundedHistory>;

    /// Threshold engine, when the watch is threshold-aware.
    fn engine(&self) -> Option<&Arc<ThresholdEngine>>;

    fn last_value(&self) -> Option<f64> {
        self.history().last().map(|s| s.value)
    }

    fn clear(&self) {
        self.history().clear();
    }

    /// Stops any periodic task behind this watch. Default: nothing to stop.
    fn stop(&self) {}
}

/// Recording/observation unit for one named metric.
///
/// Appends samples to its bounded history and, when threshold-aware,
/// feeds each sample through the breach/clear engine on the caller's
/// thread. The history may be supplied externally (shared with a remote
/// facade); otherwise the watch owns it exclusively.
pub struct Watch {
    id: String,
    view: RwLock<String>,
    history: Arc<BoundedHistory>,
    engine: Option<Arc<ThresholdEngine>>,
}

fn validated_id(id: impl Into<String>) -> Result<String> {
    let id = id.into();
    if id.trim().is_empty() {
        return Err(WatchError::EmptyId.into());
    }
    Ok(id)
}

impl Watch {
    /// New watch with a default-capacity history.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = validated_id(id)?;
        let history = Arc::new(BoundedHistory::new(&id));
        Ok(Self {
            id,
            view: RwLock::new(String::new()),
            history,
            engine: None,
        })
    }

    /// New watch with a requested history capacity (out-of-range requests
    /// fall back to the default, see [`BoundedHistory::with_max_size`]).
    pub fn with_capacity(
        id: impl Into<String>,
        capacity: i64,
    ) -> Result<Self> {
        let id = validated_id(id)?;
        let history = Arc::new(BoundedHistory::with_max_size(&id, capacity));
        Ok(Self {
            id,
            view: RwLock::new(String::new()),
            history,
            engine: None,
        })
    }

    /// New watch over a pre-existing history. The history is shared; its
    /// lifetime is that of the longest holder.
    pub fn with_history(
        id: impl Into<String>,
        history: Arc<BoundedHistory>,
    ) -> Result<Self> {
        let id = validated_id(id)?;
        Ok(Self {
            id,
            view: RwLock::new(String::new()),
            history,
            engine: None,
        })
    }

    /// Makes the watch threshold-aware. The engine lives exactly as long
    /// as the watch.
    pub fn with_thresholds(
        mut self,
        values: ThresholdValues,
    ) -> Self {
        self.engine = Some(Arc::new(ThresholdEngine::new(self.id.clone(), values)));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display hint for browser layers.
    pub fn view(&self) -> String {
        self.view.read().clone()
    }

    pub fn set_view(
        &self,
        view: impl Into<String>,
    ) {
        *self.view.write() = view.into();
    }

    pub fn history(&self) -> &Arc<BoundedHistory> {
        &self.history
    }

    pub fn engine(&self) -> Option<&Arc<ThresholdEngine>> {
        self.engine.as_ref()
    }

    /// Records one reading stamped with the current wall clock.
    ///
    /// # Errors
    /// [`WatchError::HistoryClosed`] after the watch was closed. Listener
    /// and replicator trouble never surfaces here.
    pub fn record(
        &self,
        value: f64,
    ) -> Result<()> {
        self.record_sample(Sample::new(&self.id, value))
    }

    /// Records one annotated reading.
    pub fn record_with_detail(
        &self,
        value: f64,
        detail: impl Into<String>,
    ) -> Result<()> {
        self.record_sample(Sample::new(&self.id, value).with_detail(detail))
    }

    pub(crate) fn record_sample(
        &self,
        sample: Sample,
    ) -> Result<()> {
        self.history.add(sample.clone())?;
        if let Some(engine) = &self.engine {
            engine.evaluate(&sample);
        }
        Ok(())
    }

    /// Registers a threshold listener for future events.
    ///
    /// # Errors
    /// [`WatchError::NotThresholdAware`] when the watch was built without
    /// an engine.
    pub fn attach_listener(
        &self,
        listener: Arc<dyn ThresholdListener>,
    ) -> Result<bool> {
        match &self.engine {
            Some(engine) => Ok(engine.add_listener(listener)),
            None => Err(WatchError::NotThresholdAware { id: self.id.clone() }.into()),
        }
    }

    /// Deregisters a threshold listener. Idempotent; `Ok(false)` when the
    /// listener was not attached.
    pub fn detach_listener(
        &self,
        listener: &Arc<dyn ThresholdListener>,
    ) -> Result<bool> {
        match &self.engine {
            Some(engine) => Ok(engine.remove_listener(listener)),
            None => Err(WatchError::NotThresholdAware { id: self.id.clone() }.into()),
        }
    }

    /// Replaces the threshold values wholesale (policy-driven updates).
    pub fn set_threshold_values(
        &self,
        values: ThresholdValues,
    ) -> Result<()> {
        match &self.engine {
            Some(engine) => {
                engine.set_threshold_values(values);
                Ok(())
            }
            None => Err(WatchError::NotThresholdAware { id: self.id.clone() }.into()),
        }
    }

    /// Snapshot of the current threshold values, `None` for plain watches.
    pub fn threshold_values(&self) -> Option<ThresholdValues> {
        self.engine.as_ref().map(|e| e.threshold_values())
    }
}

impl WatchPoint for Watch {
    fn id(&self) -> &str {
        &self.id
    }

    fn history(&self) -> &Arc<BoundedHistory> {
        &self.history
    }

    fn engine(&self) -> Option<&Arc<ThresholdEngine>> {
        self.engine.as_ref()
    }
}

impl std::fmt::Debug for Watch {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Watch")
            .field("id", &self.id)
            .field("threshold_aware", &self.engine.is_some())
            .finish()
    }
}
