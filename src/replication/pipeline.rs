use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::instrument;
use tracing::trace;
use tracing::warn;

use crate::metrics::REPLICATION_FAILURES;
use crate::metrics::REPLICATION_QUEUE_DEPTH;
use crate::ReplicationConfig;
use crate::ReplicationError;
use crate::Replicator;
use crate::Result;
use crate::Sample;

struct WorkerState {
    queue_tx: Option<mpsc::UnboundedSender<Sample>>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    drained_rx: Option<oneshot::Receiver<()>>,
}

/// Asynchronous replication pipeline: one unbounded queue and exactly one
/// worker task feeding a single [`Replicator`].
///
/// `enqueue` never blocks the producer beyond pushing onto the queue.
/// Sink failures are logged and counted inside the worker; the loop keeps
/// running. On `close` the worker drains whatever is still queued in one
/// `bulk_replicate` call, closes the sink last, and signals a one-shot
/// gate the closing task waits on (bounded by the configured drain
/// timeout).
pub struct QueuedReplicator {
    name: String,
    inner: Arc<dyn Replicator>,
    poll_interval: Duration,
    drain_timeout: Duration,

    state: Mutex<WorkerState>,
    closed: AtomicBool,
}

impl QueuedReplicator {
    /// Builds the pipeline and starts its worker.
    pub fn new(
        name: impl Into<String>,
        inner: Arc<dyn Replicator>,
        config: &ReplicationConfig,
    ) -> Arc<Self> {
        let pipeline = Arc::new(Self {
            name: name.into(),
            inner,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            drain_timeout: Duration::from_millis(config.drain_timeout_ms),
            state: Mutex::new(WorkerState {
                queue_tx: None,
                cancel: CancellationToken::new(),
                handle: None,
                drained_rx: None,
            }),
            closed: AtomicBool::new(true),
        });
        pipeline.reopen();
        pipeline
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Starts (or restarts after a state restore) exactly one worker over
    /// a fresh, empty queue. A live worker makes this a no-op, so calling
    /// it twice never spawns duplicates.
    pub fn reopen(&self) {
        let mut state = self.state.lock();
        if !self.closed.load(Ordering::Acquire) {
            if let Some(handle) = &state.handle {
                if !handle.is_finished() {
                    trace!("pipeline {} already running, reopen ignored", self.name);
                    return;
                }
            }
        }

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (drained_tx, drained_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        state.queue_tx = Some(queue_tx);
        state.cancel = cancel.clone();
        state.drained_rx = Some(drained_rx);
        state.handle = Some(tokio::spawn(Self::worker_loop(
            self.name.clone(),
            self.inner.clone(),
            queue_rx,
            cancel,
            drained_tx,
            self.poll_interval,
        )));

        self.closed.store(false, Ordering::Release);
        REPLICATION_QUEUE_DEPTH.with_label_values(&[&self.name]).set(0.0);
        debug!("pipeline {} worker started", self.name);
    }

    /// Queues one sample for replication.
    ///
    /// # Errors
    /// [`ReplicationError::QueueClosed`] once the pipeline is closed.
    pub fn enqueue(
        &self,
        sample: Sample,
    ) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ReplicationError::QueueClosed.into());
        }

        let state = self.state.lock();
        let Some(tx) = state.queue_tx.as_ref() else {
            return Err(ReplicationError::QueueClosed.into());
        };
        if tx.send(sample).is_err() {
            return Err(ReplicationError::QueueClosed.into());
        }
        REPLICATION_QUEUE_DEPTH.with_label_values(&[&self.name]).inc();
        Ok(())
    }

    /// Closes the pipeline: wakes the worker, waits for the final bulk
    /// drain to complete (bounded by the drain timeout), after which the
    /// sink itself has been closed. Repeated calls are no-ops.
    ///
    /// # Errors
    /// [`ReplicationError::DrainTimeout`] when the drain misses the bound;
    /// the pipeline is still marked closed.
    #[instrument(skip(self), fields(name = %self.name))]
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let (cancel, drained_rx) = {
            let mut state = self.state.lock();
            state.queue_tx = None;
            (state.cancel.clone(), state.drained_rx.take())
        };
        cancel.cancel();

        if let Some(drained_rx) = drained_rx {
            match timeout(self.drain_timeout, drained_rx).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => warn!("pipeline {} worker dropped its drain gate", self.name),
                Err(_) => {
                    error!(
                        "pipeline {} drain missed the {:?} bound",
                        self.name, self.drain_timeout
                    );
                    return Err(ReplicationError::DrainTimeout(self.drain_timeout).into());
                }
            }
        }
        debug!("pipeline {} closed", self.name);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn worker_loop(
        name: String,
        inner: Arc<dyn Replicator>,
        mut queue_rx: mpsc::UnboundedReceiver<Sample>,
        cancel: CancellationToken,
        drained_tx: oneshot::Sender<()>,
        poll_interval: Duration,
    ) {
        trace!("pipeline {} worker loop entered", name);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                // recv is cancel-safe, an unpicked sample stays queued for
                // the drain below
                received = timeout(poll_interval, queue_rx.recv()) => match received {
                    Ok(Some(sample)) => {
                        REPLICATION_QUEUE_DEPTH.with_label_values(&[&name]).dec();
                        if let Err(e) = inner.replicate(&sample).await {
                            REPLICATION_FAILURES.with_label_values(&[&name]).inc();
                            warn!("pipeline {} replicate failed: {:?}", name, e);
                        }
                    }
                    Ok(None) => break,
                    Err(_) => trace!("pipeline {} queue idle", name),
                }
            }
        }

        Self::drain(&name, &inner, &mut queue_rx).await;
        if let Err(e) = inner.close().await {
            warn!("pipeline {} sink close failed: {:?}", name, e);
        }
        if drained_tx.send(()).is_err() {
            trace!("pipeline {} drain gate receiver gone", name);
        }
        trace!("pipeline {} worker loop exited", name);
    }

    /// Final flush: everything still queued goes out in one bulk call.
    async fn drain(
        name: &str,
        inner: &Arc<dyn Replicator>,
        queue_rx: &mut mpsc::UnboundedReceiver<Sample>,
    ) {
        let mut remaining = Vec::new();
        while let Ok(sample) = queue_rx.try_recv() {
            remaining.push(sample);
        }
        REPLICATION_QUEUE_DEPTH.with_label_values(&[name]).set(0.0);
        if remaining.is_empty() {
            return;
        }

        debug!("pipeline {} bulk draining {} samples", name, remaining.len());
        if let Err(e) = inner.bulk_replicate(&remaining).await {
            REPLICATION_FAILURES.with_label_values(&[name]).inc();
            error!("pipeline {} bulk drain failed: {:?}", name, e);
        }
    }
}

impl Drop for QueuedReplicator {
    fn drop(&mut self) {
        // Best effort: wake the worker so it drains and exits
        self.state.lock().cancel.cancel();
        trace!("pipeline {} dropped", self.name);
    }
}

impl std::fmt::Debug for QueuedReplicator {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("QueuedReplicator")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}
