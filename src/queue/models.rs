//! Queue data models and error types

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Misconfiguration of a queue or a query against it.
///
/// Duplicate adds and empty retrieves are ordinary outcomes and are
/// reported through `bool` and `Option`, never through this type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// A duration given in signed milliseconds was negative
    #[error("{name} must be non-negative, got {value_ms} ms")]
    NegativeDuration { name: &'static str, value_ms: i64 },

    /// The registry already holds its maximum number of channels
    #[error("channel limit of {max} reached")]
    ChannelLimit { max: usize },
}

impl QueueError {
    /// Convert signed milliseconds into a duration, rejecting negatives
    pub fn non_negative_millis(
        name: &'static str,
        value_ms: i64,
    ) -> Result<Duration, QueueError> {
        u64::try_from(value_ms)
            .map(Duration::from_millis)
            .map_err(|_| QueueError::NegativeDuration { name, value_ms })
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
pub fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Snapshot of a single delay queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub delay_ms: u64,
    pub pending: usize,
    pub total_messages: u64,
    pub history_len: usize,
}
