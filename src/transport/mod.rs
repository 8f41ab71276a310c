//! Message transport boundary.
//!
//! The bridge only talks to brokers through the [`Transport`],
//! [`MessageReader`] and [`MessageWriter`] traits. [`kafka`] provides the
//! production implementation on top of librdkafka; [`memory`] is an
//! in-process broker used by tests and dry runs.

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("no broker reachable: {0}")]
    DialFailed(String),

    #[error("ensure topic {topic} failed: {reason}")]
    TopicEnsureFailed { topic: String, reason: String },

    #[error("unknown topic {0}")]
    UnknownTopic(String),

    #[error("read failed: {0}")]
    Read(String),

    #[error("write to {topic} failed: {reason}")]
    Write { topic: String, reason: String },

    #[error("client setup failed: {0}")]
    Client(String),

    #[error("transport closed")]
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub key: String,
    pub value: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Bytes>,
    pub value: Bytes,
    pub headers: Vec<Header>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: Option<i64>,
}

impl Message {
    #[must_use]
    pub fn new(topic: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.headers.push(Header {
            key: key.into(),
            value: Some(value.into()),
        });
        self
    }

    #[must_use]
    pub const fn with_timestamp(mut self, millis: i64) -> Self {
        self.timestamp = Some(millis);
        self
    }

    /// Headers keyed by lowercase name; later duplicates win.
    #[must_use]
    pub fn header_map(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .map(|h| {
                let value = h
                    .value
                    .as_deref()
                    .map(|v| String::from_utf8_lossy(v).into_owned())
                    .unwrap_or_default();
                (h.key.to_lowercase(), value)
            })
            .collect()
    }

    /// Deep copy of key, value, headers and timestamp for `topic`.
    ///
    /// Partition and offset are left for the destination to assign.
    #[must_use]
    pub fn forwarded(&self, topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            partition: -1,
            offset: -1,
            key: self.key.as_deref().map(Bytes::copy_from_slice),
            value: Bytes::copy_from_slice(&self.value),
            headers: self
                .headers
                .iter()
                .map(|h| Header {
                    key: h.key.clone(),
                    value: h.value.as_deref().map(Bytes::copy_from_slice),
                })
                .collect(),
            timestamp: self.timestamp,
        }
    }
}

/// A consumer-group subscription.
#[async_trait]
pub trait MessageReader: Send {
    /// Waits for the next message. Errors are terminal for the reader.
    async fn recv(&mut self) -> Result<Message, TransportError>;
}

/// A producer bound to one topic.
#[async_trait]
pub trait MessageWriter: Send + Sync {
    fn topic(&self) -> &str;

    /// Writes one message and waits for the broker acknowledgement.
    async fn write(&self, message: Message) -> Result<(), TransportError>;

    /// Flushes anything buffered.
    async fn close(&self) -> Result<(), TransportError>;
}

/// One broker cluster.
// async_trait is required here because Transport is used as Arc<dyn Transport>
// and native async fn in traits does not support dyn dispatch.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    async fn subscribe(
        &self,
        group_id: &str,
        topics: &[String],
    ) -> Result<Box<dyn MessageReader>, TransportError>;

    /// Creates `topic` if it does not exist yet.
    async fn ensure_topic(&self, topic: &str) -> Result<(), TransportError>;

    async fn writer(&self, topic: &str) -> Result<Box<dyn MessageWriter>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_map_lowercases_keys() {
        let msg = Message::new("t", "{}")
            .with_header("Content-Type", "json")
            .with_header("X-Feed", "orders");
        let map = msg.header_map();
        assert_eq!(map.get("content-type").map(String::as_str), Some("json"));
        assert_eq!(map.get("x-feed").map(String::as_str), Some("orders"));
        assert!(!map.contains_key("X-Feed"));
    }

    #[test]
    fn forwarded_copies_payload_and_metadata() {
        let original = Message {
            topic: "src".into(),
            partition: 3,
            offset: 42,
            key: Some(Bytes::from_static(b"k")),
            value: Bytes::from_static(b"{\"a\":1}"),
            headers: vec![Header {
                key: "h".into(),
                value: None,
            }],
            timestamp: Some(1_700_000_000_000),
        };
        let copy = original.forwarded("dst");
        assert_eq!(copy.topic, "dst");
        assert_eq!(copy.key, original.key);
        assert_eq!(copy.value, original.value);
        assert_eq!(copy.headers, original.headers);
        assert_eq!(copy.timestamp, original.timestamp);
        assert_eq!(copy.offset, -1);
        assert_ne!(copy.value.as_ptr(), original.value.as_ptr());
    }
}
