//! The delay queue engine.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::message::PubSubMessage;
use crate::metrics::QueueMetrics;

use super::clock::{Clock, SystemClock};
use super::models::{saturating_millis, QueueError, QueueStats};

/// A time-delayed, deduplicating message queue.
///
/// Messages become retrievable once they are at least `delay` old, oldest
/// first. Transient messages are dropped once they outlive their lifetime.
/// Every add and retrieve is logged so the busiest window of operations can
/// be reported through [`DelayQueue::peak_load`].
///
/// # Design
///
/// - One `Mutex` guards all state; each operation takes it exactly once
/// - Pending messages are kept sorted by timestamp, ties in insertion order
/// - A side index of pending ids makes duplicate detection O(1)
/// - Retrieve never blocks; callers poll
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use time_delay_queue::message::PubSubMessage;
/// use time_delay_queue::queue::DelayQueue;
/// use uuid::Uuid;
///
/// let queue = DelayQueue::new(Duration::from_millis(0));
/// let msg = PubSubMessage::simple(Uuid::new_v4(), Uuid::new_v4(), "hello");
///
/// assert!(queue.add(msg.clone()));
/// assert!(!queue.add(msg.clone()));
/// assert_eq!(queue.retrieve(), Some(msg));
/// assert_eq!(queue.total_message_count(), 1);
/// ```
pub struct DelayQueue {
    delay: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    /// Undelivered messages, ascending by timestamp
    pending: VecDeque<PubSubMessage>,
    /// Ids of everything in `pending`
    pending_ids: HashSet<Uuid>,
    /// Successful adds over the queue's life
    total_count: u64,
    /// One instant per add/retrieve, non-decreasing
    history: Vec<DateTime<Utc>>,
}

impl QueueState {
    fn record_operation(&mut self, now: DateTime<Utc>) {
        let at = match self.history.last() {
            Some(&last) if last > now => last,
            _ => now,
        };
        self.history.push(at);
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.pending.len();
        let ids = &mut self.pending_ids;
        self.pending.retain(|msg| {
            if msg.is_expired_at(now) {
                ids.remove(&msg.id());
                tracing::debug!(
                    message_id = %msg.id(),
                    timestamp = %msg.timestamp(),
                    "Transient message expired"
                );
                false
            } else {
                true
            }
        });
        let expired = before - self.pending.len();
        QueueMetrics::record_expired(expired);
        expired
    }

    fn insert(&mut self, msg: PubSubMessage) -> bool {
        if !self.pending_ids.insert(msg.id()) {
            return false;
        }
        let timestamp = msg.timestamp();
        let position = self.pending.partition_point(|m| m.timestamp() <= timestamp);
        self.pending.insert(position, msg);
        self.total_count += 1;
        true
    }

    fn pop_eligible(&mut self, now: DateTime<Utc>, delay: Duration) -> Option<PubSubMessage> {
        let oldest = self.pending.front()?;
        if !oldest.has_aged(now, delay) {
            return None;
        }
        let msg = self.pending.pop_front()?;
        self.pending_ids.remove(&msg.id());
        Some(msg)
    }
}

impl DelayQueue {
    /// Create a queue on the system clock
    pub fn new(delay: Duration) -> Self {
        Self::with_clock(delay, Arc::new(SystemClock))
    }

    /// Create a queue that reads time from `clock`
    pub fn with_clock(delay: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            delay,
            clock,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Create a queue from a signed millisecond delay, rejecting negatives
    pub fn from_millis(delay_ms: i64) -> Result<Self, QueueError> {
        let delay = QueueError::non_negative_millis("delay", delay_ms)?;
        Ok(Self::new(delay))
    }

    /// Minimum age before a message can be retrieved
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Add a message.
    ///
    /// Returns `false` without touching the queue when a message with the
    /// same id is already pending. The attempt is logged either way.
    pub fn add(&self, msg: PubSubMessage) -> bool {
        let mut state = self.state.lock();
        let now = self.clock.now();
        state.record_operation(now);
        state.purge_expired(now);

        let id = msg.id();
        let accepted = state.insert(msg);
        QueueMetrics::record_add(accepted);

        if accepted {
            tracing::debug!(
                message_id = %id,
                pending = state.pending.len(),
                total = state.total_count,
                "Message added to delay queue"
            );
        } else {
            tracing::debug!(message_id = %id, "Duplicate message rejected");
        }

        accepted
    }

    /// Take the oldest message if it has aged past the delay.
    ///
    /// Only the oldest pending message is considered: if it is too young,
    /// `None` is returned even when nothing newer qualifies either.
    pub fn retrieve(&self) -> Option<PubSubMessage> {
        let mut state = self.state.lock();
        let now = self.clock.now();
        state.record_operation(now);
        state.purge_expired(now);

        let next = state.pop_eligible(now, self.delay);
        QueueMetrics::record_retrieve(next.is_some());

        if let Some(msg) = &next {
            tracing::debug!(
                message_id = %msg.id(),
                pending = state.pending.len(),
                "Message retrieved from delay queue"
            );
        }

        next
    }

    /// Messages ever accepted; unaffected by retrieval or expiry
    pub fn total_message_count(&self) -> u64 {
        self.state.lock().total_count
    }

    /// Largest number of operations in any closed window of length `window`
    /// that starts at a recorded operation. Zero for an empty history.
    pub fn peak_load(&self, window: Duration) -> usize {
        let state = self.state.lock();
        peak_load_in(&state.history, window)
    }

    /// [`DelayQueue::peak_load`] for a signed millisecond window
    pub fn peak_load_millis(&self, window_ms: i64) -> Result<usize, QueueError> {
        let window = QueueError::non_negative_millis("window", window_ms)?;
        Ok(self.peak_load(window))
    }

    /// Drop every transient message past its lifetime.
    ///
    /// Add and retrieve already do this first; calling it directly only
    /// reclaims memory sooner and is not logged as an operation.
    pub fn purge_expired(&self) -> usize {
        let mut state = self.state.lock();
        let now = self.clock.now();
        state.purge_expired(now)
    }

    /// Number of pending messages, expired transients included until the
    /// next purge
    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of operations logged so far
    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        QueueStats {
            delay_ms: saturating_millis(self.delay),
            pending: state.pending.len(),
            total_messages: state.total_count,
            history_len: state.history.len(),
        }
    }
}

impl fmt::Debug for DelayQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayQueue")
            .field("delay", &self.delay)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

/// Anchored closed-window peak over a non-decreasing history.
///
/// For each anchor `h[i]`, counts `h[j]` with `h[i] <= h[j] <= h[i] + window`.
/// Both ends only move forward, so one sweep suffices.
fn peak_load_in(history: &[DateTime<Utc>], window: Duration) -> usize {
    let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
    let mut peak = 0;
    let mut end = 0;

    for (start, anchor) in history.iter().enumerate() {
        let limit = anchor
            .checked_add_signed(window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        end = end.max(start);
        while end < history.len() && history[end] <= limit {
            end += 1;
        }
        peak = peak.max(end - start);
    }

    peak
}
