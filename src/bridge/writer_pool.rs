//! Lazily created, shared destination writers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::transport::{MessageWriter, Transport, TransportError};

/// One writer per destination topic, created on first use.
///
/// Topic creation and writer construction both happen under the table
/// lock, so concurrent first writes to the same topic build one writer.
pub struct WriterPool {
    transport: Arc<dyn Transport>,
    writers: Mutex<HashMap<String, Arc<dyn MessageWriter>>>,
}

impl WriterPool {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            writers: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, topic: &str) -> Result<Arc<dyn MessageWriter>, TransportError> {
        let mut writers = self.writers.lock().await;
        if let Some(writer) = writers.get(topic) {
            return Ok(Arc::clone(writer));
        }

        self.transport.ensure_topic(topic).await?;
        let writer: Arc<dyn MessageWriter> = Arc::from(self.transport.writer(topic).await?);
        writers.insert(topic.to_string(), Arc::clone(&writer));
        tracing::info!(topic = %topic, cluster = %self.transport.name(), "destination writer created");
        Ok(writer)
    }

    /// Number of cached writers.
    pub async fn len(&self) -> usize {
        self.writers.lock().await.len()
    }

    /// Closes every writer. All are attempted; the first error is returned.
    pub async fn close(&self) -> Result<(), TransportError> {
        let writers: Vec<_> = self.writers.lock().await.drain().collect();
        let mut first_error = None;
        for (topic, writer) in writers {
            if let Err(e) = writer.close().await {
                tracing::warn!(topic = %topic, error = %e, "closing writer failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::MemoryTransport;
    use crate::transport::Message;

    fn pool(transport: &MemoryTransport) -> WriterPool {
        WriterPool::new(Arc::new(transport.clone()))
    }

    #[tokio::test]
    async fn creates_topic_once_and_reuses_writer() {
        let transport = MemoryTransport::new("bridge");
        let pool = pool(&transport);

        let first = pool.get("out").await.unwrap();
        let second = pool.get("out").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(transport.ensure_calls(), 1);
        assert!(transport.has_topic("out"));

        first.write(Message::new("out", "v")).await.unwrap();
        assert_eq!(transport.messages("out").len(), 1);
    }

    #[tokio::test]
    async fn concurrent_first_use_builds_one_writer() {
        let transport = MemoryTransport::new("bridge");
        let pool = Arc::new(pool(&transport));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            tasks.spawn(async move { pool.get("shared").await.map(|_| ()) });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        assert_eq!(transport.ensure_calls(), 1);
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test]
    async fn existing_topic_is_not_an_error() {
        let transport = MemoryTransport::new("bridge");
        transport.create_topic("out");
        assert!(pool(&transport).get("out").await.is_ok());
    }

    #[tokio::test]
    async fn topic_creation_failure_is_not_cached() {
        let transport = MemoryTransport::new("bridge");
        transport.reject_topic("out", "not authorized");
        let pool = pool(&transport);

        assert!(matches!(
            pool.get("out").await,
            Err(TransportError::TopicEnsureFailed { .. })
        ));
        assert_eq!(pool.len().await, 0);
    }

    #[tokio::test]
    async fn unreachable_cluster_fails_to_dial() {
        let transport = MemoryTransport::new("bridge");
        transport.shutdown();
        assert!(matches!(
            pool(&transport).get("out").await,
            Err(TransportError::DialFailed(_))
        ));
    }

    #[tokio::test]
    async fn close_empties_the_pool() {
        let transport = MemoryTransport::new("bridge");
        let pool = pool(&transport);
        pool.get("a").await.unwrap();
        pool.get("b").await.unwrap();

        pool.close().await.unwrap();
        assert_eq!(pool.len().await, 0);
    }
}
