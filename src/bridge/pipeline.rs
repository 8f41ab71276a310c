//! The two per-route loops.
//!
//! [`ReferenceCollector`] feeds reference messages into a route's
//! [`Matcher`]; [`SourceStreamer`] forwards source messages that match
//! the route's cached values. Both run until the cancellation token fires
//! or their subscription fails.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{Stats, WriterPool};
use crate::engine::Matcher;
use crate::transport::{Message, MessageReader, Transport, TransportError};

/// Why a route loop returned without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Cancelled,
}

async fn next_message(
    reader: &mut dyn MessageReader,
    cancel: &CancellationToken,
) -> Option<Result<Message, TransportError>> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        result = reader.recv() => Some(result),
    }
}

/// Records a loop that ended on a transport error. The route stays down
/// until the process restarts.
fn loop_failed(stats: &Stats, route: &str, kind: &str, error: &TransportError) {
    stats.loops_failed.fetch_add(1, Ordering::Relaxed);
    tracing::error!(route = %route, kind, error = %error, "route stopped");
}

pub struct ReferenceCollector {
    pub matcher: Arc<Matcher>,
    pub transport: Arc<dyn Transport>,
    pub group_id: String,
    pub topics: Vec<String>,
    pub stats: Arc<Stats>,
}

impl ReferenceCollector {
    pub async fn run(self, cancel: CancellationToken) -> Result<LoopExit, TransportError> {
        let result = self.consume(&cancel).await;
        if let Err(e) = &result {
            loop_failed(&self.stats, self.matcher.route_id(), "reference", e);
        }
        result
    }

    async fn consume(&self, cancel: &CancellationToken) -> Result<LoopExit, TransportError> {
        let route = self.matcher.route_id();
        let mut reader = self.transport.subscribe(&self.group_id, &self.topics).await?;
        tracing::info!(
            route = %route,
            group = %self.group_id,
            topics = %self.topics.join(","),
            "reference collector listening"
        );

        while let Some(result) = next_message(reader.as_mut(), cancel).await {
            self.handle(&result?);
        }
        Ok(LoopExit::Cancelled)
    }

    fn handle(&self, message: &Message) {
        let route = self.matcher.route_id();
        match self
            .matcher
            .process_reference(&message.topic, &message.header_map(), &message.value)
        {
            Ok(ingested) => {
                self.stats.references_ingested.fetch_add(1, Ordering::Relaxed);
                if ingested.added {
                    tracing::info!(
                        route = %route,
                        feed = %ingested.feed,
                        cached = self.matcher.size(),
                        "reference values cached"
                    );
                }
            }
            Err(e) => {
                self.stats.references_rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    route = %route,
                    topic = %message.topic,
                    offset = message.offset,
                    error = %e,
                    "reference skipped"
                );
            }
        }
    }
}

pub struct SourceStreamer {
    pub matcher: Arc<Matcher>,
    pub transport: Arc<dyn Transport>,
    pub group_id: String,
    pub topics: Vec<String>,
    pub destination: String,
    pub writers: Arc<WriterPool>,
    pub stats: Arc<Stats>,
}

impl SourceStreamer {
    pub async fn run(self, cancel: CancellationToken) -> Result<LoopExit, TransportError> {
        let result = self.consume(&cancel).await;
        if let Err(e) = &result {
            loop_failed(&self.stats, self.matcher.route_id(), "source", e);
        }
        result
    }

    async fn consume(&self, cancel: &CancellationToken) -> Result<LoopExit, TransportError> {
        let mut reader = self.transport.subscribe(&self.group_id, &self.topics).await?;
        tracing::info!(
            route = %self.matcher.route_id(),
            group = %self.group_id,
            cluster = %self.transport.name(),
            topics = %self.topics.join(","),
            destination = %self.destination,
            "source streamer listening"
        );

        while let Some(result) = next_message(reader.as_mut(), cancel).await {
            self.handle(&result?).await;
        }
        Ok(LoopExit::Cancelled)
    }

    async fn handle(&self, message: &Message) {
        let route = self.matcher.route_id();
        self.stats.source_messages.fetch_add(1, Ordering::Relaxed);

        match self.matcher.should_forward(&message.value) {
            Ok(true) => {}
            Ok(false) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(e) => {
                self.stats.invalid_payloads.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    route = %route,
                    topic = %message.topic,
                    offset = message.offset,
                    error = %e,
                    "invalid payload skipped"
                );
                return;
            }
        }

        let writer = match self.writers.get(&self.destination).await {
            Ok(writer) => writer,
            Err(e) => {
                self.stats.write_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    route = %route,
                    destination = %self.destination,
                    error = %e,
                    "destination unavailable, message dropped"
                );
                return;
            }
        };

        match writer.write(message.forwarded(&self.destination)).await {
            Ok(()) => {
                self.stats.forwarded.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    route = %route,
                    offset = message.offset,
                    destination = %self.destination,
                    "message forwarded"
                );
            }
            Err(e) => {
                self.stats.write_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    route = %route,
                    offset = message.offset,
                    error = %e,
                    "write failed, message dropped"
                );
            }
        }
    }
}
