//! Watch Core Error Hierarchy
//!
//! Defines error types for the metrics watch core, categorized by
//! recording surface, replication pipeline and remote access concerns.

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Structural misuse of the recording surface (bad arguments,
    /// use-after-close)
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Replication pipeline failures
    #[error(transparent)]
    Replication(#[from] ReplicationError),

    /// Remote watch access failures
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Error {
    /// Whether a failed remote call may be retried against the same
    /// backend. Structural misuse and configuration errors never are.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Remote(RemoteError::Unavailable(_))
                | Error::Remote(RemoteError::CallTimeout(_))
                | Error::Replication(ReplicationError::Sink(_))
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Watch identifiers must be non-empty
    #[error("watch id must not be empty")]
    EmptyId,

    /// Write attempted on a closed history
    #[error("history for watch '{id}' is closed")]
    HistoryClosed { id: String },

    /// Elapsed-time stop without a matching start on the calling thread
    #[error("no elapsed-time measurement started on this thread for watch '{id}'")]
    StopWithoutStart { id: String },

    /// Threshold operation on a watch built without an engine
    #[error("watch '{id}' is not threshold-aware")]
    NotThresholdAware { id: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    /// Sink I/O failure while replicating one or more samples
    #[error("replicator sink failure: {0}")]
    Sink(String),

    /// Enqueue attempted after the pipeline was closed
    #[error("replication queue is closed")]
    QueueClosed,

    /// Final drain did not complete within the configured bound
    #[error("replication drain timed out after {0:?}")]
    DrainTimeout(Duration),

    /// Worker task failed to join during shutdown
    #[error("replication worker failed: {0}")]
    WorkerFailed(#[from] JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Backend reachable but not serving
    #[error("remote watch unavailable: {0}")]
    Unavailable(String),

    /// Per-call timeout from the retry policy
    #[error("remote call timed out after {0:?}")]
    CallTimeout(Duration),

    /// Retry policy exhaustion against a single backend
    #[error("retry attempts exhausted after {attempts} tries")]
    RetriesExhausted { attempts: usize },

    /// Every candidate backend was dropped or exhausted
    #[error("no remote watch backend left to try")]
    BackendsExhausted,
}
