use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;
use tracing::debug;
use tracing::warn;

use crate::utils::retry_with_backoff;
use crate::BackoffPolicy;
use crate::Error;
use crate::RemoteError;
use crate::Result;
use crate::Sample;

/// Client view of a watch hosted elsewhere. Transports implement this;
/// the core only specifies the calls a remote history must answer.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemoteWatch: Send + Sync + 'static {
    async fn last(&self) -> Result<Option<Sample>>;

    async fn snapshot(&self) -> Result<Vec<Sample>>;

    async fn record(
        &self,
        sample: Sample,
    ) -> Result<()>;
}

/// Failover wrapper over an ordered list of candidate backends.
///
/// Each call walks the candidates in order. Against one backend, calls
/// retry under the supplied [`BackoffPolicy`]; a backend that exhausts
/// its retries stays in the list (it may recover), one that fails with a
/// non-retryable error is dropped for good. When no candidate answers
/// the call fails with [`RemoteError::BackendsExhausted`].
pub struct FailoverClient {
    backends: Mutex<Vec<Arc<dyn RemoteWatch>>>,
    policy: BackoffPolicy,
}

impl FailoverClient {
    pub fn new(
        backends: Vec<Arc<dyn RemoteWatch>>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            backends: Mutex::new(backends),
            policy,
        }
    }

    pub fn backend_count(&self) -> usize {
        self.backends.lock().len()
    }

    pub async fn last(&self) -> Result<Option<Sample>> {
        self.call(|backend| async move { backend.last().await }).await
    }

    pub async fn snapshot(&self) -> Result<Vec<Sample>> {
        self.call(|backend| async move { backend.snapshot().await }).await
    }

    pub async fn record(
        &self,
        sample: Sample,
    ) -> Result<()> {
        self.call(move |backend| {
            let sample = sample.clone();
            async move { backend.record(sample).await }
        })
        .await
    }

    async fn call<F, Fut, P>(
        &self,
        op: F,
    ) -> Result<P>
    where
        F: Fn(Arc<dyn RemoteWatch>) -> Fut,
        Fut: std::future::Future<Output = Result<P>>,
    {
        let candidates: Vec<Arc<dyn RemoteWatch>> = self.backends.lock().clone();
        if candidates.is_empty() {
            return Err(RemoteError::BackendsExhausted.into());
        }

        for backend in candidates {
            match retry_with_backoff(|| op(backend.clone()), &self.policy).await {
                Ok(value) => return Ok(value),
                Err(Error::Remote(RemoteError::RetriesExhausted { attempts })) => {
                    debug!("backend exhausted {} attempts, trying the next candidate", attempts);
                }
                Err(e) => {
                    warn!("dropping backend on non-retryable error: {:?}", e);
                    self.backends.lock().retain(|b| !Arc::ptr_eq(b, &backend));
                }
            }
        }
        Err(RemoteError::BackendsExhausted.into())
    }
}
