use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::sleep;

use super::*;
use crate::test_utils::enable_logger;
use crate::Error;
use crate::ReplicationConfig;
use crate::ReplicationError;
use crate::Result;
use crate::Sample;

/// Sink that records everything it receives and how it received it.
#[derive(Default)]
struct CountingReplicator {
    received: Mutex<Vec<Sample>>,
    single_calls: AtomicUsize,
    bulk_calls: AtomicUsize,
    close_calls: AtomicUsize,
    replicate_delay: Option<Duration>,
    fail_first_replicate: AtomicUsize,
}

impl CountingReplicator {
    fn with_delay(delay: Duration) -> Self {
        Self {
            replicate_delay: Some(delay),
            ..Default::default()
        }
    }

    fn total_received(&self) -> usize {
        self.received.lock().len()
    }
}

#[async_trait::async_trait]
impl Replicator for CountingReplicator {
    async fn replicate(
        &self,
        sample: &Sample,
    ) -> Result<()> {
        if let Some(delay) = self.replicate_delay {
            sleep(delay).await;
        }
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_first_replicate.load(Ordering::SeqCst) > 0 {
            self.fail_first_replicate.fetch_sub(1, Ordering::SeqCst);
            return Err(ReplicationError::Sink("injected failure".into()).into());
        }
        self.received.lock().push(sample.clone());
        Ok(())
    }

    async fn bulk_replicate(
        &self,
        samples: &[Sample],
    ) -> Result<()> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        self.received.lock().extend_from_slice(samples);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn fast_config() -> ReplicationConfig {
    ReplicationConfig {
        poll_interval_ms: 20,
        drain_timeout_ms: 2_000,
    }
}

fn samples(n: usize) -> Vec<Sample> {
    (0..n).map(|i| Sample::at("pipeline-test", i as f64, i as i64)).collect()
}

#[tokio::test]
async fn test_close_delivers_exactly_n() {
    enable_logger();
    for n in [0_usize, 1, 100, 101] {
        let sink = Arc::new(CountingReplicator::default());
        let pipeline = QueuedReplicator::new("exactly-n", sink.clone(), &fast_config());

        for sample in samples(n) {
            pipeline.enqueue(sample).expect("enqueue should succeed");
        }
        pipeline.close().await.expect("close should drain");

        assert_eq!(sink.total_received(), n, "lost or duplicated samples for n={}", n);
        let received = sink.received.lock();
        let mut values: Vec<u64> = received.iter().map(|s| s.value as u64).collect();
        values.sort_unstable();
        assert_eq!(values, (0..n as u64).collect::<Vec<_>>());
        assert_eq!(sink.close_calls.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test]
async fn test_slow_sink_close_uses_bulk_drain() {
    enable_logger();
    let sink = Arc::new(CountingReplicator::with_delay(Duration::from_millis(50)));
    let pipeline = QueuedReplicator::new("bulk-drain", sink.clone(), &fast_config());

    for sample in samples(10) {
        pipeline.enqueue(sample).unwrap();
    }
    // The sink is slow enough that most of the queue is still pending
    pipeline.close().await.unwrap();

    assert_eq!(sink.total_received(), 10);
    assert!(
        sink.bulk_calls.load(Ordering::SeqCst) >= 1,
        "close with a non-empty queue must flush through the bulk path"
    );
}

#[tokio::test]
async fn test_sink_failure_does_not_stop_worker() {
    enable_logger();
    let sink = Arc::new(CountingReplicator {
        fail_first_replicate: AtomicUsize::new(1),
        ..Default::default()
    });
    let pipeline = QueuedReplicator::new("keeps-going", sink.clone(), &fast_config());

    pipeline.enqueue(Sample::at("keeps-going", 1.0, 1)).unwrap();
    pipeline.enqueue(Sample::at("keeps-going", 2.0, 2)).unwrap();
    // Let the worker attempt both through the per-item path
    sleep(Duration::from_millis(200)).await;
    pipeline.close().await.unwrap();

    // First sample was eaten by the injected failure, second still made it
    assert_eq!(sink.single_calls.load(Ordering::SeqCst), 2);
    assert_eq!(sink.total_received(), 1);
}

#[tokio::test]
async fn test_enqueue_after_close_is_rejected() {
    enable_logger();
    let sink = Arc::new(CountingReplicator::default());
    let pipeline = QueuedReplicator::new("closed", sink, &fast_config());

    pipeline.close().await.unwrap();
    let result = pipeline.enqueue(Sample::at("closed", 1.0, 1));
    assert!(matches!(
        result,
        Err(Error::Replication(ReplicationError::QueueClosed))
    ));
}

#[tokio::test]
async fn test_close_is_idempotent() {
    enable_logger();
    let sink = Arc::new(CountingReplicator::default());
    let pipeline = QueuedReplicator::new("idempotent-close", sink.clone(), &fast_config());

    pipeline.close().await.unwrap();
    pipeline.close().await.unwrap();
    assert_eq!(sink.close_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reopen_on_live_pipeline_is_noop() {
    enable_logger();
    let sink = Arc::new(CountingReplicator::default());
    let pipeline = QueuedReplicator::new("reopen-live", sink.clone(), &fast_config());

    // Already running: must not spawn a second worker or touch the queue
    pipeline.reopen();
    pipeline.reopen();

    for sample in samples(5) {
        pipeline.enqueue(sample).unwrap();
    }
    pipeline.close().await.unwrap();
    assert_eq!(sink.total_received(), 5);
    assert_eq!(sink.close_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reopen_after_close_restarts_worker() {
    enable_logger();
    let sink = Arc::new(CountingReplicator::default());
    let pipeline = QueuedReplicator::new("reopen-after-close", sink.clone(), &fast_config());

    pipeline.enqueue(Sample::at("reopen-after-close", 1.0, 1)).unwrap();
    pipeline.close().await.unwrap();
    assert!(pipeline.is_closed());

    pipeline.reopen();
    assert!(!pipeline.is_closed());
    pipeline.enqueue(Sample::at("reopen-after-close", 2.0, 2)).unwrap();
    pipeline.close().await.unwrap();

    assert_eq!(sink.total_received(), 2);
}

#[tokio::test]
async fn test_close_drain_timeout_is_bounded() {
    enable_logger();
    let sink = Arc::new(CountingReplicator::with_delay(Duration::from_millis(400)));
    let config = ReplicationConfig {
        poll_interval_ms: 20,
        drain_timeout_ms: 50,
    };
    let pipeline = QueuedReplicator::new("drain-timeout", sink, &config);

    for sample in samples(4) {
        pipeline.enqueue(sample).unwrap();
    }
    let result = pipeline.close().await;
    assert!(matches!(
        result,
        Err(Error::Replication(ReplicationError::DrainTimeout(_)))
    ));
    assert!(pipeline.is_closed());
}
