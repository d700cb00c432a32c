//! Per-channel queue registry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

use super::clock::{Clock, SystemClock};
use super::delay_queue::DelayQueue;
use super::models::{saturating_millis, QueueError, QueueStats};

/// One delay queue per logical channel, created on first use.
///
/// Every queue shares the registry's delay and clock. The number of live
/// channels is capped at `max_channels`; removing a channel frees its slot.
#[derive(Debug)]
pub struct QueueRegistry {
    queues: DashMap<String, Arc<DelayQueue>>,
    delay: Duration,
    clock: Arc<dyn Clock>,
    max_channels: usize,
    /// Live channels, kept in step with `queues` under its shard locks
    channel_count: AtomicUsize,
}

impl QueueRegistry {
    /// Create an uncapped registry whose queues use `delay` and the system clock
    pub fn new(delay: Duration) -> Self {
        Self::with_clock(delay, Arc::new(SystemClock))
    }

    pub fn with_clock(delay: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            queues: DashMap::new(),
            delay,
            clock,
            max_channels: usize::MAX,
            channel_count: AtomicUsize::new(0),
        }
    }

    /// Cap the number of channels this registry will create
    pub fn with_max_channels(mut self, max_channels: usize) -> Self {
        self.max_channels = max_channels;
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn max_channels(&self) -> usize {
        self.max_channels
    }

    /// Get the queue for `channel`, creating it if needed.
    ///
    /// Fails with [`QueueError::ChannelLimit`] when the channel is new and
    /// the registry is full.
    pub fn get_or_create(&self, channel: &str) -> Result<Arc<DelayQueue>, QueueError> {
        if let Some(queue) = self.queues.get(channel) {
            return Ok(queue.clone());
        }

        match self.queues.entry(channel.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let max = self.max_channels;
                let reserved = self
                    .channel_count
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                        (n < max).then(|| n + 1)
                    });
                if reserved.is_err() {
                    tracing::warn!(
                        channel = %channel,
                        max_channels = max,
                        "Channel limit reached, queue not created"
                    );
                    return Err(QueueError::ChannelLimit { max });
                }

                tracing::info!(
                    channel = %channel,
                    delay_ms = saturating_millis(self.delay),
                    "Created delay queue for channel"
                );
                let queue = Arc::new(DelayQueue::with_clock(self.delay, self.clock.clone()));
                entry.insert(queue.clone());
                Ok(queue)
            }
        }
    }

    /// Get the queue for `channel` if it exists
    pub fn get(&self, channel: &str) -> Option<Arc<DelayQueue>> {
        self.queues.get(channel).map(|q| q.clone())
    }

    /// Drop a channel's queue, returning it if it existed
    pub fn remove(&self, channel: &str) -> Option<Arc<DelayQueue>> {
        let removed = self.queues.remove(channel).map(|(_, q)| q);
        if let Some(queue) = &removed {
            self.channel_count.fetch_sub(1, Ordering::AcqRel);
            tracing::info!(
                channel = %channel,
                pending = queue.len(),
                "Removed delay queue for channel"
            );
        }
        removed
    }

    /// Names of all channels, sorted
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.queues.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Purge expired transient messages from every queue.
    ///
    /// Returns the number of messages removed.
    pub fn purge_all(&self) -> usize {
        // Collect queues first to avoid holding shard locks while purging
        let queues: Vec<Arc<DelayQueue>> =
            self.queues.iter().map(|r| r.value().clone()).collect();
        let removed: usize = queues.iter().map(|q| q.purge_expired()).sum();

        if removed > 0 {
            tracing::info!(
                removed = removed,
                channels = queues.len(),
                "Purged expired transient messages"
            );
        }

        removed
    }

    /// Registry-wide statistics
    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            delay_ms: saturating_millis(self.delay),
            max_channels: self.max_channels,
            ..Default::default()
        };

        for entry in self.queues.iter() {
            let queue = entry.value().stats();
            stats.channels += 1;
            stats.pending += queue.pending;
            stats.total_messages += queue.total_messages;
            stats.max_pending = stats.max_pending.max(queue.pending);
        }

        stats
    }

    /// Stats for a single channel
    pub fn channel_stats(&self, channel: &str) -> Option<QueueStats> {
        self.get(channel).map(|q| q.stats())
    }
}

/// Statistics across all channels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub delay_ms: u64,
    pub channels: usize,
    pub max_channels: usize,
    pub pending: usize,
    pub max_pending: usize,
    pub total_messages: u64,
}
