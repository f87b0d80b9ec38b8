use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::debug;

use crate::Result;
use crate::Sample;

/// A sink that durably or remotely persists samples.
///
/// Implementations are never called concurrently for `replicate` /
/// `bulk_replicate`: the owning pipeline's single worker is the only
/// caller. `close` may race a final drain and must tolerate being called
/// once after the last replicate.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Replicator: Send + Sync + 'static {
    /// Persist one sample.
    async fn replicate(
        &self,
        sample: &Sample,
    ) -> Result<()>;

    /// Persist a batch in one operation. Used for the final drain at
    /// shutdown.
    async fn bulk_replicate(
        &self,
        samples: &[Sample],
    ) -> Result<()>;

    /// Release the underlying resource.
    async fn close(&self) -> Result<()>;
}

/// Trivial in-process sink that logs every sample. The core ships no
/// transport; this is the only replicator it provides.
#[derive(Debug, Default)]
pub struct LoggingReplicator;

#[async_trait]
impl Replicator for LoggingReplicator {
    async fn replicate(
        &self,
        sample: &Sample,
    ) -> Result<()> {
        debug!(
            "replicated sample id={} value={} ts={}",
            sample.id, sample.value, sample.timestamp_ms
        );
        Ok(())
    }

    async fn bulk_replicate(
        &self,
        samples: &[Sample],
    ) -> Result<()> {
        debug!("bulk replicated {} samples", samples.len());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
