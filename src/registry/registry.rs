use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use futures::future::join_all;
use tracing::debug;
use tracing::instrument;
use tracing::warn;

use crate::constants::system_watch_id;
use crate::ComputeResourceSource;
use crate::RegistrationSink;
use crate::ThresholdListener;
use crate::WatchPoint;

/// Process-wide directory of live watches.
///
/// Owns the id → watch table, the id → threshold-listener bindings (which
/// outlive the watches they target: a listener may be bound before its
/// watch exists and survives a deregister/register cycle), and the
/// pluggable registration sink driving the external management
/// collaborator.
#[derive(Default)]
pub struct WatchRegistry {
    watches: DashMap<String, Arc<dyn WatchPoint>>,
    listeners: DashMap<String, Vec<Arc<dyn ThresholdListener>>>,
    registration: ArcSwapOption<Box<dyn RegistrationSink>>,
    compute_resource: ArcSwapOption<Box<dyn ComputeResourceSource>>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs (or replaces) the management registration sink.
    pub fn set_registration_sink(
        &self,
        sink: Option<Box<dyn RegistrationSink>>,
    ) {
        self.registration.store(sink.map(Arc::new));
    }

    /// Installs (or replaces) the system-metrics collaborator behind
    /// [`WatchRegistry::fetch_one`].
    pub fn set_compute_resource(
        &self,
        source: Option<Box<dyn ComputeResourceSource>>,
    ) {
        self.compute_resource.store(source.map(Arc::new));
    }

    /// Adds watches to the directory. Listeners already bound to a
    /// watch's id attach now; the registration sink is told about each
    /// addition. Registering an id twice replaces the earlier entry.
    pub fn register(
        &self,
        watches: Vec<Arc<dyn WatchPoint>>,
    ) {
        for watch in watches {
            let id = watch.id().to_string();

            if let Some(bound) = self.listeners.get(&id) {
                match watch.engine() {
                    Some(engine) => {
                        for listener in bound.iter() {
                            engine.add_listener(listener.clone());
                        }
                    }
                    None if !bound.is_empty() => {
                        warn!("listeners bound to '{}' but the watch is not threshold-aware", id);
                    }
                    None => {}
                }
            }

            if let Some(previous) = self.watches.insert(id.clone(), watch.clone()) {
                warn!("watch '{}' re-registered, replacing earlier entry", previous.id());
            }
            if let Some(sink) = self.registration.load_full() {
                sink.registered(watch);
            }
            debug!("watch '{}' registered", id);
        }
    }

    /// Removes watches from the directory: periodic tasks stop, each
    /// history closes (draining its pipelines), engine-side listener
    /// attachments are dropped, and the sink is notified. The id →
    /// listener bindings themselves survive for a later re-register.
    #[instrument(skip_all)]
    pub async fn deregister(
        &self,
        ids: Vec<String>,
    ) {
        for id in ids {
            let Some((_, watch)) = self.watches.remove(&id) else {
                debug!("deregister: no watch '{}' found", id);
                continue;
            };
            Self::detach_bound_listeners(&self.listeners, &watch);
            watch.stop();
            watch.history().close().await;
            if let Some(sink) = self.registration.load_full() {
                sink.deregistered(&id);
            }
            debug!("watch '{}' deregistered", id);
        }
    }

    /// Binds a listener to a watch id, attaching immediately when a
    /// threshold-aware watch with that id is already registered. The
    /// binding is kept either way. Idempotent per listener.
    pub fn add_threshold_listener(
        &self,
        id: impl Into<String>,
        listener: Arc<dyn ThresholdListener>,
    ) {
        let id = id.into();
        {
            let mut bound = self.listeners.entry(id.clone()).or_default();
            if !bound.iter().any(|l| Arc::ptr_eq(l, &listener)) {
                bound.push(listener.clone());
            }
        }

        if let Some(watch) = self.watches.get(&id) {
            match watch.engine() {
                Some(engine) => {
                    engine.add_listener(listener);
                }
                None => warn!("watch '{}' is not threshold-aware, listener stays pending", id),
            }
        }
    }

    /// Unbinds a listener from a watch id and detaches it from the live
    /// engine, if any. Idempotent.
    pub fn remove_threshold_listener(
        &self,
        id: &str,
        listener: &Arc<dyn ThresholdListener>,
    ) {
        if let Some(mut bound) = self.listeners.get_mut(id) {
            bound.retain(|l| !Arc::ptr_eq(l, listener));
        }
        if let Some(watch) = self.watches.get(id) {
            if let Some(engine) = watch.engine() {
                engine.remove_listener(listener);
            }
        }
    }

    /// Lookup in the registry's own table.
    pub fn find_watch(
        &self,
        id: &str,
    ) -> Option<Arc<dyn WatchPoint>> {
        self.watches.get(id).map(|w| w.value().clone())
    }

    /// Every registered watch.
    pub fn fetch_all(&self) -> Vec<Arc<dyn WatchPoint>> {
        self.watches.iter().map(|e| e.value().clone()).collect()
    }

    /// Lookup that routes the well-known system metric ids to the
    /// compute-resource collaborator instead of the registry table.
    pub fn fetch_one(
        &self,
        id: &str,
    ) -> Option<Arc<dyn WatchPoint>> {
        if system_watch_id::is_system_id(id) {
            if let Some(source) = self.compute_resource.load_full() {
                return source.fetch(id);
            }
            warn!("system watch '{}' requested but no compute resource installed", id);
            return None;
        }
        self.find_watch(id)
    }

    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    /// Closes every registered watch (stopping periodic tasks and
    /// draining pipelines) without removing the entries. Contrast with
    /// [`WatchRegistry::deregister`].
    #[instrument(skip(self))]
    pub async fn close_all(&self) {
        let watches = self.fetch_all();
        for watch in &watches {
            watch.stop();
        }
        join_all(watches.iter().map(|watch| watch.history().close())).await;
        debug!("closed {} watches", self.watch_count());
    }

    fn detach_bound_listeners(
        listeners: &DashMap<String, Vec<Arc<dyn ThresholdListener>>>,
        watch: &Arc<dyn WatchPoint>,
    ) {
        let Some(engine) = watch.engine() else {
            return;
        };
        if let Some(bound) = listeners.get(watch.id()) {
            for listener in bound.iter() {
                engine.remove_listener(listener);
            }
        }
    }
}

impl std::fmt::Debug for WatchRegistry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("WatchRegistry")
            .field("watches", &self.watch_count())
            .finish()
    }
}
