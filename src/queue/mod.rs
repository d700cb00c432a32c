//! Time-delayed message queue.
//!
//! This module provides [`DelayQueue`], which withholds messages until they
//! reach a minimum age, expires transient messages after their lifetime and
//! keeps an operation history for peak-load queries, plus a
//! [`QueueRegistry`] holding one queue per channel.

mod clock;
mod delay_queue;
mod models;
mod registry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use delay_queue::DelayQueue;
pub use models::{saturating_millis, QueueError, QueueStats};
pub use registry::{QueueRegistry, RegistryStats};
