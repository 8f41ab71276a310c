//! Kafka [`Transport`] backed by librdkafka.
//!
//! Readers are `StreamConsumer`s joined to a named consumer group with
//! auto-commit. Writers are one `FutureProducer` per destination topic
//! that waits for full-ISR acknowledgement before returning. Topic
//! creation goes through the admin API with broker-side defaults.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::RDKafkaErrorCode;
use rdkafka::message::{BorrowedMessage, Header as KafkaHeader, Headers, Message as _, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;

use super::{Header, Message, MessageReader, MessageWriter, Transport, TransportError};
use crate::config::model::{ClusterConfig, StartOffset, TlsConfig};

const ADMIN_TIMEOUT: Duration = Duration::from_secs(5);
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Consumer settings shared by every subscription on a cluster.
#[derive(Debug, Clone)]
pub struct KafkaSettings {
    pub client_id: String,
    pub commit_interval: Duration,
    pub start_offset: StartOffset,
}

pub struct KafkaTransport {
    name: String,
    base: ClientConfig,
    admin: AdminClient<DefaultClientContext>,
    settings: KafkaSettings,
}

impl KafkaTransport {
    pub fn new(
        name: impl Into<String>,
        cluster: &ClusterConfig,
        settings: KafkaSettings,
    ) -> Result<Self, TransportError> {
        let name = name.into();
        let mut base = ClientConfig::new();
        base.set("bootstrap.servers", cluster.brokers.join(","))
            .set("client.id", &settings.client_id);
        if let Some(tls) = &cluster.tls {
            apply_tls(&mut base, tls);
        }

        let admin = base
            .create::<AdminClient<DefaultClientContext>>()
            .map_err(|e| TransportError::Client(format!("{name}: {e}")))?;

        tracing::debug!(cluster = %name, brokers = %cluster.brokers.join(","), "kafka client configured");

        Ok(Self {
            name,
            base,
            admin,
            settings,
        })
    }
}

fn apply_tls(config: &mut ClientConfig, tls: &TlsConfig) {
    config.set("security.protocol", "ssl");
    if let Some(ca) = &tls.ca_file {
        config.set("ssl.ca.location", ca);
    }
    if let Some(cert) = &tls.cert_file {
        config.set("ssl.certificate.location", cert);
    }
    if let Some(key) = &tls.key_file {
        config.set("ssl.key.location", key);
    }
    if tls.insecure_skip_verify {
        config
            .set("enable.ssl.certificate.verification", "false")
            .set("ssl.endpoint.identification.algorithm", "none");
    }
}

fn to_message(msg: &BorrowedMessage<'_>) -> Message {
    let headers = msg
        .headers()
        .map(|hs| {
            hs.iter()
                .map(|h| Header {
                    key: h.key.to_string(),
                    value: h.value.map(Bytes::copy_from_slice),
                })
                .collect()
        })
        .unwrap_or_default();

    Message {
        topic: msg.topic().to_string(),
        partition: msg.partition(),
        offset: msg.offset(),
        key: msg.key().map(Bytes::copy_from_slice),
        value: msg.payload().map(Bytes::copy_from_slice).unwrap_or_default(),
        headers,
        timestamp: msg.timestamp().to_millis(),
    }
}

struct KafkaReader {
    consumer: StreamConsumer,
}

#[async_trait]
impl MessageReader for KafkaReader {
    async fn recv(&mut self) -> Result<Message, TransportError> {
        self.consumer
            .recv()
            .await
            .map(|msg| to_message(&msg))
            .map_err(|e| TransportError::Read(e.to_string()))
    }
}

struct KafkaWriter {
    topic: String,
    producer: FutureProducer,
}

#[async_trait]
impl MessageWriter for KafkaWriter {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn write(&self, message: Message) -> Result<(), TransportError> {
        let mut headers = OwnedHeaders::new_with_capacity(message.headers.len());
        for h in &message.headers {
            headers = headers.insert(KafkaHeader {
                key: h.key.as_str(),
                value: h.value.as_deref(),
            });
        }

        let mut record = FutureRecord::<[u8], [u8]>::to(&self.topic)
            .payload(&message.value[..])
            .headers(headers);
        if let Some(key) = message.key.as_deref() {
            record = record.key(key);
        }
        if let Some(ts) = message.timestamp {
            record = record.timestamp(ts);
        }

        self.producer
            .send(record, Timeout::After(DELIVERY_TIMEOUT))
            .await
            .map(|_| ())
            .map_err(|(e, _)| TransportError::Write {
                topic: self.topic.clone(),
                reason: e.to_string(),
            })
    }

    async fn close(&self) -> Result<(), TransportError> {
        let producer = self.producer.clone();
        let topic = self.topic.clone();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(FLUSH_TIMEOUT)))
            .await
            .map_err(|e| TransportError::Write {
                topic: topic.clone(),
                reason: e.to_string(),
            })?
            .map_err(|e| TransportError::Write {
                topic,
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl Transport for KafkaTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn subscribe(
        &self,
        group_id: &str,
        topics: &[String],
    ) -> Result<Box<dyn MessageReader>, TransportError> {
        let consumer: StreamConsumer = self
            .base
            .clone()
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set(
                "auto.commit.interval.ms",
                self.settings.commit_interval.as_millis().to_string(),
            )
            .set("auto.offset.reset", self.settings.start_offset.as_str())
            .create()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topic_refs)
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Box::new(KafkaReader { consumer }))
    }

    async fn ensure_topic(&self, topic: &str) -> Result<(), TransportError> {
        let new_topic = NewTopic::new(topic, -1, TopicReplication::Fixed(-1));
        let options = AdminOptions::new().request_timeout(Some(ADMIN_TIMEOUT));

        let results = self
            .admin
            .create_topics([&new_topic], &options)
            .await
            .map_err(|e| TransportError::DialFailed(format!("{}: {e}", self.name)))?;

        for result in results {
            match result {
                Ok(_) | Err((_, RDKafkaErrorCode::TopicAlreadyExists)) => {}
                Err((name, code)) => {
                    return Err(TransportError::TopicEnsureFailed {
                        topic: name,
                        reason: code.to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    async fn writer(&self, topic: &str) -> Result<Box<dyn MessageWriter>, TransportError> {
        let producer: FutureProducer = self
            .base
            .clone()
            .set("acks", "all")
            .create()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Box::new(KafkaWriter {
            topic: topic.to_string(),
            producer,
        }))
    }
}
