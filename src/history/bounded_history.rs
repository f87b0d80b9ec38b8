use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;
use parking_lot::RwLock;
use tracing::debug;
use tracing::instrument;
use tracing::trace;
use tracing::warn;

use crate::constants::DEFAULT_COLLECTION_SIZE;
use crate::constants::MAX_COLLECTION_SIZE;
use crate::metrics::SAMPLES_RECORDED;
use crate::QueuedReplicator;
use crate::Result;
use crate::Sample;
use crate::WatchError;

/// Returns `requested` when it lies in `[1, MAX_COLLECTION_SIZE]`,
/// otherwise falls back to [`DEFAULT_COLLECTION_SIZE`].
fn effective_size(requested: i64) -> usize {
    if requested >= 1 && requested <= MAX_COLLECTION_SIZE as i64 {
        requested as usize
    } else {
        warn!(
            "requested collection size {} outside [1, {}], using default {}",
            requested, MAX_COLLECTION_SIZE, DEFAULT_COLLECTION_SIZE
        );
        DEFAULT_COLLECTION_SIZE
    }
}

struct Buffer {
    samples: VecDeque<Sample>,
    max_size: usize,
}

/// Size-capped FIFO buffer of samples for one metric, plus the set of
/// replication pipelines fed on every append.
///
/// All buffer mutation goes through this type's own synchronized API; a
/// history may be shared between a watch and a remote facade, in which
/// case its lifetime is that of the longest holder.
pub struct BoundedHistory {
    id: String,

    buffer: RwLock<Buffer>,
    replicators: Mutex<Vec<Arc<QueuedReplicator>>>,
    closed: AtomicBool,
}

impl BoundedHistory {
    /// New history with the default capacity.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_max_size(id, DEFAULT_COLLECTION_SIZE as i64)
    }

    /// New history with a requested capacity; out-of-range requests fall
    /// back to the default rather than erroring.
    pub fn with_max_size(
        id: impl Into<String>,
        requested: i64,
    ) -> Self {
        Self {
            id: id.into(),
            buffer: RwLock::new(Buffer {
                samples: VecDeque::new(),
                max_size: effective_size(requested),
            }),
            replicators: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Appends one sample, evicting the oldest entry beyond capacity,
    /// then hands the sample to every attached pipeline without blocking
    /// on sink I/O.
    ///
    /// # Errors
    /// [`WatchError::HistoryClosed`] once [`BoundedHistory::close`] has run;
    /// a closed history must never silently drop writes.
    pub fn add(
        &self,
        sample: Sample,
    ) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(WatchError::HistoryClosed { id: self.id.clone() }.into());
        }

        {
            let mut buf = self.buffer.write();
            buf.samples.push_back(sample.clone());
            while buf.samples.len() > buf.max_size {
                let evicted = buf.samples.pop_front();
                trace!("history {} evicted sample: {:?}", self.id, evicted);
            }
        }
        SAMPLES_RECORDED.with_label_values(&[&self.id]).inc();

        let replicators = self.replicators.lock().clone();
        for replicator in replicators {
            if let Err(e) = replicator.enqueue(sample.clone()) {
                // Sink trouble never surfaces to the producer
                warn!("history {} failed to enqueue to replicator: {:?}", self.id, e);
            }
        }

        Ok(())
    }

    /// Immutable copy of the current buffer, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.buffer.read().samples.iter().cloned().collect()
    }

    /// Subsequence with timestamps in `[from_ms, to_ms]`, oldest first.
    pub fn snapshot_range(
        &self,
        from_ms: i64,
        to_ms: i64,
    ) -> Vec<Sample> {
        self.buffer
            .read()
            .samples
            .iter()
            .filter(|s| s.timestamp_ms >= from_ms && s.timestamp_ms <= to_ms)
            .cloned()
            .collect()
    }

    /// Most recent sample, if any.
    pub fn last(&self) -> Option<Sample> {
        self.buffer.read().samples.back().cloned()
    }

    pub fn len(&self) -> usize {
        self.buffer.read().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.read().samples.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.buffer.read().max_size
    }

    /// Empties the buffer. Replicators and threshold state are untouched.
    pub fn clear(&self) {
        self.buffer.write().samples.clear();
    }

    /// Resizes the buffer capacity. Shrinking truncates to the most
    /// recent `requested` entries; out-of-range requests fall back to the
    /// default capacity, same as at construction.
    pub fn set_max_size(
        &self,
        requested: i64,
    ) {
        let mut buf = self.buffer.write();
        buf.max_size = effective_size(requested);
        while buf.samples.len() > buf.max_size {
            buf.samples.pop_front();
        }
        debug!("history {} capacity now {}", self.id, buf.max_size);
    }

    /// Attaches a pipeline. Returns false when the same pipeline is
    /// already attached.
    pub fn add_replicator(
        &self,
        replicator: Arc<QueuedReplicator>,
    ) -> bool {
        let mut replicators = self.replicators.lock();
        if replicators.iter().any(|r| Arc::ptr_eq(r, &replicator)) {
            return false;
        }
        replicators.push(replicator);
        true
    }

    /// Detaches a pipeline. Returns whether it was attached.
    pub fn remove_replicator(
        &self,
        replicator: &Arc<QueuedReplicator>,
    ) -> bool {
        let mut replicators = self.replicators.lock();
        let before = replicators.len();
        replicators.retain(|r| !Arc::ptr_eq(r, replicator));
        replicators.len() != before
    }

    #[cfg(test)]
    pub(crate) fn replicator_count(&self) -> usize {
        self.replicators.lock().len()
    }

    /// Closes and detaches every attached pipeline (awaiting each drain),
    /// then marks the history closed. Idempotent; later [`BoundedHistory::add`]
    /// calls are rejected.
    #[instrument(skip(self), fields(id = %self.id))]
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let replicators = {
            let mut guard = self.replicators.lock();
            std::mem::take(&mut *guard)
        };
        for replicator in replicators {
            if let Err(e) = replicator.close().await {
                warn!("history {} replicator close failed: {:?}", self.id, e);
            }
        }
        debug!("history {} closed", self.id);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for BoundedHistory {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("BoundedHistory")
            .field("id", &self.id)
            .field("len", &self.len())
            .field("max_size", &self.max_size())
            .finish()
    }
}
