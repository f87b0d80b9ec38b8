use serde::Deserialize;
use serde::Serialize;

use crate::utils::now_ms;

/// One timestamped metric reading.
///
/// A sample is immutable once it has been handed to a history: mutation
/// is only possible through `&mut self`, which the type system rules out
/// after the sample is shared across threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Identifier of the watch this reading belongs to
    pub id: String,
    /// The recorded value
    pub value: f64,
    /// Milliseconds since the epoch at recording time
    pub timestamp_ms: i64,
    /// Optional free-form annotation for display layers
    pub detail: Option<String>,
}

impl Sample {
    /// New sample stamped with the current wall clock.
    pub fn new(
        id: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            id: id.into(),
            value,
            timestamp_ms: now_ms(),
            detail: None,
        }
    }

    /// New sample with an explicit timestamp.
    pub fn at(
        id: impl Into<String>,
        value: f64,
        timestamp_ms: i64,
    ) -> Self {
        Self {
            id: id.into(),
            value,
            timestamp_ms,
            detail: None,
        }
    }

    /// Attach an annotation. Only callable while the sample is still
    /// exclusively owned.
    pub fn set_detail(
        &mut self,
        detail: impl Into<String>,
    ) {
        self.detail = Some(detail.into());
    }

    /// Builder-style variant of [`Sample::set_detail`].
    pub fn with_detail(
        mut self,
        detail: impl Into<String>,
    ) -> Self {
        self.set_detail(detail);
        self
    }

    /// Annotation text for display layers, empty when unset.
    pub fn detail_text(&self) -> &str {
        self.detail.as_deref().unwrap_or("")
    }
}
