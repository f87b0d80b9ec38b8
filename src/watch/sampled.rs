use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::constants::SAMPLE_MISS_LIMIT;
use crate::BoundedHistory;
use crate::Result;
use crate::ThresholdEngine;
use crate::Watch;
use crate::WatchPoint;

/// Caller-supplied accessor a sampled watch reads on every tick.
///
/// `Ok(None)` means "no value available right now" and counts toward the
/// consecutive-miss limit; so does an error.
#[cfg_attr(test, automock)]
pub trait SampleSource: Send + Sync + 'static {
    fn sample(&self) -> Result<Option<f64>>;
}

/// Watch fed by a periodic task instead of a producer.
///
/// Misses are tolerated as long as they stay isolated: every empty read
/// bumps a miss counter, every good read walks it back down (floored at
/// zero), and once the counter passes [`SAMPLE_MISS_LIMIT`] the task
/// cancels itself and logs.
pub struct SampledWatch {
    watch: Arc<Watch>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SampledWatch {
    /// Starts sampling `source` every `period` into `watch`'s history.
    pub fn start(
        watch: Watch,
        source: Arc<dyn SampleSource>,
        period: Duration,
    ) -> Self {
        let watch = Arc::new(watch);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Self::sampler_loop(
            watch.clone(),
            source,
            period,
            cancel.clone(),
        ));
        Self {
            watch,
            cancel,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Cancels the periodic task. Idempotent; a tick already in progress
    /// may still complete, nothing records after it.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    async fn sampler_loop(
        watch: Arc<Watch>,
        source: Arc<dyn SampleSource>,
        period: Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = interval(period);
        let mut misses: u32 = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("sampled watch {} stopped", watch.id());
                    break;
                }
                _ = ticker.tick() => {
                    match source.sample() {
                        Ok(Some(value)) => {
                            misses = misses.saturating_sub(1);
                            if let Err(e) = watch.record(value) {
                                warn!("sampled watch {} cannot record, stopping: {:?}", watch.id(), e);
                                break;
                            }
                        }
                        Ok(None) => {
                            misses += 1;
                            trace!("sampled watch {} empty read ({} misses)", watch.id(), misses);
                        }
                        Err(e) => {
                            misses += 1;
                            warn!("sampled watch {} accessor failed ({} misses): {:?}", watch.id(), misses, e);
                        }
                    }
                    if misses > SAMPLE_MISS_LIMIT {
                        warn!(
                            "sampled watch {} cancelling itself after {} consecutive empty reads",
                            watch.id(),
                            misses
                        );
                        break;
                    }
                }
            }
        }
    }
}

impl Deref for SampledWatch {
    type Target = Watch;

    fn deref(&self) -> &Self::Target {
        &self.watch
    }
}

impl WatchPoint for SampledWatch {
    fn id(&self) -> &str {
        self.watch.id()
    }

    fn history(&self) -> &Arc<BoundedHistory> {
        self.watch.history()
    }

    fn engine(&self) -> Option<&Arc<ThresholdEngine>> {
        self.watch.engine()
    }

    fn stop(&self) {
        SampledWatch::stop(self);
    }
}

impl Drop for SampledWatch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
