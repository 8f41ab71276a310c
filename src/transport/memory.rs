//! In-process broker implementing [`Transport`].
//!
//! Topics are append-only logs; every consumer group keeps its own read
//! position per topic and starts from the beginning of the log. Clones of
//! a [`MemoryTransport`] share the same broker, so a test can keep one
//! handle for publishing and inspection while the bridge owns another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::{Message, MessageReader, MessageWriter, Transport, TransportError};

#[derive(Default)]
struct Broker {
    topics: HashMap<String, Vec<Message>>,
    // (group, topic) -> index of the next unread message
    positions: HashMap<(String, String), usize>,
    rejected_topics: HashMap<String, String>,
    closed: bool,
}

#[derive(Default)]
struct Shared {
    broker: Mutex<Broker>,
    arrivals: Notify,
    ensure_calls: AtomicUsize,
}

#[derive(Clone)]
pub struct MemoryTransport {
    name: String,
    shared: Arc<Shared>,
}

impl MemoryTransport {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn create_topic(&self, topic: &str) {
        self.shared
            .broker
            .lock()
            .topics
            .entry(topic.to_string())
            .or_default();
    }

    #[must_use]
    pub fn has_topic(&self, topic: &str) -> bool {
        self.shared.broker.lock().topics.contains_key(topic)
    }

    /// Appends `message` to its topic, creating the topic if needed.
    /// Returns the assigned offset.
    pub fn publish(&self, mut message: Message) -> i64 {
        let offset = {
            let mut broker = self.shared.broker.lock();
            let log = broker.topics.entry(message.topic.clone()).or_default();
            let offset = i64::try_from(log.len()).unwrap_or(i64::MAX);
            message.partition = 0;
            message.offset = offset;
            log.push(message);
            offset
        };
        self.shared.arrivals.notify_waiters();
        offset
    }

    #[must_use]
    pub fn messages(&self, topic: &str) -> Vec<Message> {
        self.shared
            .broker
            .lock()
            .topics
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Makes [`Transport::ensure_topic`] fail for `topic`.
    pub fn reject_topic(&self, topic: &str, reason: &str) {
        self.shared
            .broker
            .lock()
            .rejected_topics
            .insert(topic.to_string(), reason.to_string());
    }

    /// Number of [`Transport::ensure_topic`] calls seen so far.
    #[must_use]
    pub fn ensure_calls(&self) -> usize {
        self.shared.ensure_calls.load(Ordering::Relaxed)
    }

    /// Simulates losing the cluster: every pending and future read fails.
    pub fn shutdown(&self) {
        self.shared.broker.lock().closed = true;
        self.shared.arrivals.notify_waiters();
    }
}

struct MemoryReader {
    shared: Arc<Shared>,
    group: String,
    topics: Vec<String>,
    // Topic polled first on the next read; rotates so no topic starves.
    next_topic: usize,
}

impl MemoryReader {
    fn poll_next(&mut self) -> Option<Result<Message, TransportError>> {
        let mut guard = self.shared.broker.lock();
        let broker = &mut *guard;
        if broker.closed {
            return Some(Err(TransportError::Closed));
        }
        let count = self.topics.len();
        for step in 0..count {
            let index = (self.next_topic + step) % count;
            let topic = &self.topics[index];
            let Some(log) = broker.topics.get(topic) else {
                continue;
            };
            let position = broker
                .positions
                .entry((self.group.clone(), topic.clone()))
                .or_insert(0);
            if let Some(message) = log.get(*position) {
                *position += 1;
                self.next_topic = (index + 1) % count;
                return Some(Ok(message.clone()));
            }
        }
        None
    }
}

#[async_trait]
impl MessageReader for MemoryReader {
    async fn recv(&mut self) -> Result<Message, TransportError> {
        loop {
            // Register interest before polling so a publish between the
            // poll and the await is not missed.
            let shared = Arc::clone(&self.shared);
            let notified = shared.arrivals.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(result) = self.poll_next() {
                return result;
            }
            notified.await;
        }
    }
}

struct MemoryWriter {
    shared: Arc<Shared>,
    topic: String,
}

#[async_trait]
impl MessageWriter for MemoryWriter {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn write(&self, mut message: Message) -> Result<(), TransportError> {
        {
            let mut broker = self.shared.broker.lock();
            if broker.closed {
                return Err(TransportError::Closed);
            }
            let log = broker
                .topics
                .get_mut(&self.topic)
                .ok_or_else(|| TransportError::UnknownTopic(self.topic.clone()))?;
            message.topic.clone_from(&self.topic);
            message.partition = 0;
            message.offset = i64::try_from(log.len()).unwrap_or(i64::MAX);
            log.push(message);
        }
        self.shared.arrivals.notify_waiters();
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn subscribe(
        &self,
        group_id: &str,
        topics: &[String],
    ) -> Result<Box<dyn MessageReader>, TransportError> {
        if self.shared.broker.lock().closed {
            return Err(TransportError::DialFailed(self.name.clone()));
        }
        Ok(Box::new(MemoryReader {
            shared: Arc::clone(&self.shared),
            group: group_id.to_string(),
            topics: topics.to_vec(),
            next_topic: 0,
        }))
    }

    async fn ensure_topic(&self, topic: &str) -> Result<(), TransportError> {
        self.shared.ensure_calls.fetch_add(1, Ordering::Relaxed);
        let mut broker = self.shared.broker.lock();
        if broker.closed {
            return Err(TransportError::DialFailed(self.name.clone()));
        }
        if let Some(reason) = broker.rejected_topics.get(topic) {
            return Err(TransportError::TopicEnsureFailed {
                topic: topic.to_string(),
                reason: reason.clone(),
            });
        }
        broker.topics.entry(topic.to_string()).or_default();
        Ok(())
    }

    async fn writer(&self, topic: &str) -> Result<Box<dyn MessageWriter>, TransportError> {
        Ok(Box::new(MemoryWriter {
            shared: Arc::clone(&self.shared),
            topic: topic.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn topics(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[tokio::test]
    async fn groups_read_independently() {
        let transport = MemoryTransport::new("test");
        transport.publish(Message::new("t", "one"));
        transport.publish(Message::new("t", "two"));

        let mut a = transport.subscribe("a", &topics(&["t"])).await.unwrap();
        let mut b = transport.subscribe("b", &topics(&["t"])).await.unwrap();

        assert_eq!(a.recv().await.unwrap().value, "one");
        assert_eq!(a.recv().await.unwrap().value, "two");
        let first_b = b.recv().await.unwrap();
        assert_eq!(first_b.value, "one");
        assert_eq!(first_b.offset, 0);
    }

    #[tokio::test]
    async fn recv_wakes_on_publish() {
        let transport = MemoryTransport::new("test");
        let mut reader = transport.subscribe("g", &topics(&["late"])).await.unwrap();

        let publisher = transport.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            publisher.publish(Message::new("late", "hello"));
        });

        let msg = tokio::time::timeout(Duration::from_secs(5), reader.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.topic, "late");
    }

    #[tokio::test]
    async fn busy_topic_does_not_starve_others() {
        let transport = MemoryTransport::new("test");
        for i in 0..10 {
            transport.publish(Message::new("busy", format!("b{i}")));
        }
        transport.publish(Message::new("quiet", "q0"));

        let mut reader = transport
            .subscribe("g", &topics(&["busy", "quiet"]))
            .await
            .unwrap();
        let first = reader.recv().await.unwrap();
        let second = reader.recv().await.unwrap();
        assert_eq!(first.topic, "busy");
        assert_eq!(second.topic, "quiet");
        assert_eq!(reader.recv().await.unwrap().value, "b1");
    }

    #[tokio::test]
    async fn shutdown_fails_pending_reads() {
        let transport = MemoryTransport::new("test");
        let mut reader = transport.subscribe("g", &topics(&["t"])).await.unwrap();

        let handle = transport.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.shutdown();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), reader.recv())
            .await
            .unwrap();
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn writer_requires_existing_topic() {
        let transport = MemoryTransport::new("test");
        let writer = transport.writer("missing").await.unwrap();
        assert!(matches!(
            writer.write(Message::new("x", "v")).await,
            Err(TransportError::UnknownTopic(_))
        ));

        transport.ensure_topic("missing").await.unwrap();
        writer.write(Message::new("x", "v")).await.unwrap();
        assert_eq!(transport.messages("missing")[0].topic, "missing");
    }

    #[tokio::test]
    async fn rejected_topic_fails_to_ensure() {
        let transport = MemoryTransport::new("test");
        transport.reject_topic("bad", "policy violation");
        assert!(matches!(
            transport.ensure_topic("bad").await,
            Err(TransportError::TopicEnsureFailed { .. })
        ));
        assert!(!transport.has_topic("bad"));
    }
}
