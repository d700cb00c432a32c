//! Messages carried by the delay queue.
//!
//! A message is an immutable value with a persistent or transient kind.
//! Transient messages carry a lifetime after which the queue discards them.

mod types;

pub use types::{IntoReceivers, MessageKind, MessageType, PubSubMessage, PubSubMessageBuilder};
