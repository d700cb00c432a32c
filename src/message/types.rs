use std::hash::{Hash, Hasher};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of payload carried by a message. The queue never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Plain text (default)
    #[default]
    Simple,
    /// Structured content relayed from an external feed
    Tweet,
}

/// Persistence capability of a message.
///
/// Persistent messages stay pending until retrieved. Transient messages are
/// dropped by the queue once their age reaches `lifetime`, delivered or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Persistent,
    Transient {
        #[serde(rename = "lifetime_ms", with = "duration_millis")]
        lifetime: Duration,
    },
}

impl MessageKind {
    pub fn is_transient(&self) -> bool {
        matches!(self, MessageKind::Transient { .. })
    }

    pub fn lifetime(&self) -> Option<Duration> {
        match self {
            MessageKind::Persistent => None,
            MessageKind::Transient { lifetime } => Some(*lifetime),
        }
    }
}

/// Conversion into a receiver list, so constructors accept either a single
/// receiver or several.
pub trait IntoReceivers {
    fn into_receivers(self) -> Vec<Uuid>;
}

impl IntoReceivers for Uuid {
    fn into_receivers(self) -> Vec<Uuid> {
        vec![self]
    }
}

impl IntoReceivers for Vec<Uuid> {
    fn into_receivers(self) -> Vec<Uuid> {
        self
    }
}

impl IntoReceivers for &[Uuid] {
    fn into_receivers(self) -> Vec<Uuid> {
        self.to_vec()
    }
}

impl<const N: usize> IntoReceivers for [Uuid; N] {
    fn into_receivers(self) -> Vec<Uuid> {
        self.to_vec()
    }
}

/// One unit of data in transit through a delay queue.
///
/// Immutable once built. Identity is the `id` alone: two messages with the
/// same id compare equal even when every other field differs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubSubMessage {
    id: Uuid,
    timestamp: DateTime<Utc>,
    sender: Uuid,
    receivers: Vec<Uuid>,
    content: String,
    #[serde(rename = "type", default)]
    message_type: MessageType,
    #[serde(flatten)]
    kind: MessageKind,
}

impl PubSubMessage {
    /// Id reserved for "no message"; never produced by the generating
    /// constructors.
    pub const NO_MESSAGE_ID: Uuid = Uuid::nil();

    /// Create a persistent message with every field supplied by the caller
    pub fn new(
        id: Uuid,
        timestamp: DateTime<Utc>,
        sender: Uuid,
        receivers: impl IntoReceivers,
        content: impl Into<String>,
        message_type: MessageType,
    ) -> Self {
        Self {
            id,
            timestamp,
            sender,
            receivers: receivers.into_receivers(),
            content: content.into(),
            message_type,
            kind: MessageKind::Persistent,
        }
    }

    /// Create a transient message with every field supplied by the caller
    pub fn transient(
        id: Uuid,
        timestamp: DateTime<Utc>,
        sender: Uuid,
        receivers: impl IntoReceivers,
        content: impl Into<String>,
        message_type: MessageType,
        lifetime: Duration,
    ) -> Self {
        Self {
            kind: MessageKind::Transient { lifetime },
            ..Self::new(id, timestamp, sender, receivers, content, message_type)
        }
    }

    /// Create a persistent `Simple` message with a fresh id and the current time
    pub fn simple(sender: Uuid, receivers: impl IntoReceivers, content: impl Into<String>) -> Self {
        PubSubMessageBuilder::new(sender, receivers, content).build()
    }

    /// Create a transient `Simple` message with a fresh id and the current time
    pub fn simple_transient(
        sender: Uuid,
        receivers: impl IntoReceivers,
        content: impl Into<String>,
        lifetime: Duration,
    ) -> Self {
        PubSubMessageBuilder::new(sender, receivers, content)
            .lifetime(lifetime)
            .build()
    }

    /// Create a builder; unset id and timestamp are generated on `build`
    pub fn builder(
        sender: Uuid,
        receivers: impl IntoReceivers,
        content: impl Into<String>,
    ) -> PubSubMessageBuilder {
        PubSubMessageBuilder::new(sender, receivers, content)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn sender(&self) -> Uuid {
        self.sender
    }

    pub fn receivers(&self) -> &[Uuid] {
        &self.receivers
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Lifetime of a transient message, `None` for persistent ones
    pub fn lifetime(&self) -> Option<Duration> {
        self.kind.lifetime()
    }

    /// Time elapsed between creation and `now`. Negative when the
    /// timestamp lies in the future.
    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.timestamp)
    }

    /// Whether the message is at least `min_age` old at `now`
    pub fn has_aged(&self, now: DateTime<Utc>, min_age: Duration) -> bool {
        match chrono::Duration::from_std(min_age) {
            Ok(min_age) => self.age_at(now) >= min_age,
            Err(_) => false,
        }
    }

    /// Whether a transient message has outlived its lifetime at `now`.
    /// Persistent messages never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.kind {
            MessageKind::Persistent => false,
            MessageKind::Transient { lifetime } => self.has_aged(now, lifetime),
        }
    }
}

impl PartialEq for PubSubMessage {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PubSubMessage {}

impl Hash for PubSubMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Builder for creating messages
#[derive(Debug, Clone)]
pub struct PubSubMessageBuilder {
    id: Option<Uuid>,
    timestamp: Option<DateTime<Utc>>,
    sender: Uuid,
    receivers: Vec<Uuid>,
    content: String,
    message_type: MessageType,
    kind: MessageKind,
}

impl PubSubMessageBuilder {
    /// Create a new message builder
    pub fn new(sender: Uuid, receivers: impl IntoReceivers, content: impl Into<String>) -> Self {
        Self {
            id: None,
            timestamp: None,
            sender,
            receivers: receivers.into_receivers(),
            content: content.into(),
            message_type: MessageType::default(),
            kind: MessageKind::Persistent,
        }
    }

    /// Use an explicit id instead of a generated one
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Use an explicit creation time instead of now
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the payload type
    pub fn message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    /// Make the message transient with the given lifetime
    pub fn lifetime(mut self, lifetime: Duration) -> Self {
        self.kind = MessageKind::Transient { lifetime };
        self
    }

    /// Build the message
    pub fn build(self) -> PubSubMessage {
        PubSubMessage {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            sender: self.sender,
            receivers: self.receivers,
            content: self.content,
            message_type: self.message_type,
            kind: self.kind,
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_message_defaults() {
        let sender = Uuid::new_v4();
        let receiver = Uuid::new_v4();
        let msg = PubSubMessage::simple(sender, receiver, "hello");

        assert_ne!(msg.id(), PubSubMessage::NO_MESSAGE_ID);
        assert_eq!(msg.sender(), sender);
        assert_eq!(msg.receivers(), &[receiver]);
        assert_eq!(msg.content(), "hello");
        assert_eq!(msg.message_type(), MessageType::Simple);
        assert!(!msg.is_transient());
        assert_eq!(msg.lifetime(), None);
    }

    #[test]
    fn test_transient_constructors() {
        let sender = Uuid::new_v4();
        let receivers = vec![Uuid::new_v4(), Uuid::new_v4()];

        let msg = PubSubMessage::simple_transient(
            sender,
            receivers.clone(),
            "short lived",
            Duration::from_millis(80),
        );
        assert!(msg.is_transient());
        assert_eq!(msg.lifetime(), Some(Duration::from_millis(80)));
        assert_eq!(msg.receivers(), receivers.as_slice());

        let full = PubSubMessage::transient(
            Uuid::new_v4(),
            Utc::now(),
            sender,
            [receivers[0]],
            "full form",
            MessageType::Tweet,
            Duration::from_secs(2),
        );
        assert!(full.is_transient());
        assert_eq!(full.message_type(), MessageType::Tweet);
    }

    #[test]
    fn test_equality_is_by_id() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let a = PubSubMessage::new(id, now, Uuid::new_v4(), Uuid::new_v4(), "a", MessageType::Simple);
        let b = PubSubMessage::transient(
            id,
            now + chrono::Duration::seconds(5),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "b",
            MessageType::Tweet,
            Duration::from_secs(1),
        );
        assert_eq!(a, b);

        let c = PubSubMessage::simple(a.sender(), a.receivers(), "a");
        assert_ne!(a, c);
    }

    #[test]
    fn test_expiry_only_applies_to_transient() {
        let now = Utc::now();
        let created = now - chrono::Duration::milliseconds(100);

        let persistent = PubSubMessage::builder(Uuid::new_v4(), Uuid::new_v4(), "p")
            .timestamp(created)
            .build();
        assert!(!persistent.is_expired_at(now));

        let transient = PubSubMessage::builder(Uuid::new_v4(), Uuid::new_v4(), "t")
            .timestamp(created)
            .lifetime(Duration::from_millis(100))
            .build();
        // Age equal to lifetime counts as expired
        assert!(transient.is_expired_at(now));
        assert!(!transient.is_expired_at(now - chrono::Duration::milliseconds(1)));
    }

    #[test]
    fn test_future_timestamp_is_not_aged() {
        let now = Utc::now();
        let msg = PubSubMessage::builder(Uuid::new_v4(), Uuid::new_v4(), "later")
            .timestamp(now + chrono::Duration::seconds(10))
            .lifetime(Duration::ZERO)
            .build();
        assert!(msg.age_at(now) < chrono::Duration::zero());
        assert!(!msg.has_aged(now, Duration::ZERO));
        assert!(!msg.is_expired_at(now));
    }

    #[test]
    fn test_json_shape() {
        let msg = PubSubMessage::builder(Uuid::new_v4(), Uuid::new_v4(), "payload")
            .lifetime(Duration::from_millis(250))
            .build();

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["kind"], "transient");
        assert_eq!(value["lifetime_ms"], 250);
        assert_eq!(value["type"], "simple");

        let decoded: PubSubMessage = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.lifetime(), Some(Duration::from_millis(250)));
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_huge_lifetime_serializes_saturated() {
        let msg = PubSubMessage::builder(Uuid::new_v4(), Uuid::new_v4(), "payload")
            .lifetime(Duration::MAX)
            .build();
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["lifetime_ms"], u64::MAX);
    }
}
