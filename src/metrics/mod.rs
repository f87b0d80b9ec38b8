use lazy_static::lazy_static;
use prometheus::{GaugeVec, IntCounterVec, Opts, Registry};
use tokio::sync::watch;
use tracing::error;
use warp::{Filter, Rejection, Reply};

#[cfg(test)]
mod metrics_test;

lazy_static! {
    pub static ref SAMPLES_RECORDED: IntCounterVec = IntCounterVec::new(
        Opts::new("samples_recorded", "samples appended per watch"),
        &["id"]
    )
    .expect("metric can not be created");

    pub static ref THRESHOLD_EVENTS: IntCounterVec = IntCounterVec::new(
        Opts::new("threshold_events", "breach/clear notifications per watch"),
        &["id", "kind"]
    )
    .expect("metric can not be created");

    pub static ref REPLICATION_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("replication_failures", "sink failures per pipeline"),
        &["replicator"]
    )
    .expect("metric can not be created");

    pub static ref REPLICATION_QUEUE_DEPTH: GaugeVec = GaugeVec::new(
        Opts::new("replication_queue_depth", "samples queued per pipeline"),
        &["replicator"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(SAMPLES_RECORDED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(THRESHOLD_EVENTS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(REPLICATION_FAILURES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(REPLICATION_QUEUE_DEPTH.clone()))
        .expect("collector can be registered");
}

/// Serves `/metrics` until the shutdown signal flips.
pub async fn start_server(port: u16, mut shutdown_signal: watch::Receiver<()>) {
    register_custom_metrics(&REGISTRY);

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    let (_, server) =
        warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            let _ = shutdown_signal.changed().await;
        });
    server.await;
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {:?}", e);
    }
    let response = String::from_utf8(buffer).unwrap_or_default();

    Ok(response)
}
