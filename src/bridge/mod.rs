//! Route orchestration.
//!
//! [`Bridge`] turns the configured routes into one [`Matcher`] each and
//! runs two loops per route ([`pipeline::ReferenceCollector`] and
//! [`pipeline::SourceStreamer`]) on a shared [`WriterPool`] and
//! [`Stats`] block. A loop that hits a transport error stops and is
//! logged; the other routes keep running.

pub mod pipeline;
pub mod writer_pool;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::model::Config;
use crate::engine::Matcher;
use crate::error::BridgeError;
use crate::store::MatchStore;
use crate::transport::{Transport, TransportError};
use pipeline::{LoopExit, ReferenceCollector, SourceStreamer};
pub use writer_pool::WriterPool;

/// Matchers keyed by route identifier.
pub type Matchers = BTreeMap<String, Arc<Matcher>>;

#[derive(Debug, Default)]
pub struct Stats {
    pub references_ingested: AtomicU64,
    pub references_rejected: AtomicU64,
    pub source_messages: AtomicU64,
    pub forwarded: AtomicU64,
    pub dropped: AtomicU64,
    pub invalid_payloads: AtomicU64,
    pub write_failures: AtomicU64,
    /// Route loops that stopped on a transport error.
    pub loops_failed: AtomicU64,
}

impl Stats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            references_ingested: AtomicU64::new(0),
            references_rejected: AtomicU64::new(0),
            source_messages: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            invalid_payloads: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            loops_failed: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            references_ingested: self.references_ingested.load(Ordering::Relaxed),
            references_rejected: self.references_rejected.load(Ordering::Relaxed),
            source_messages: self.source_messages.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            invalid_payloads: self.invalid_payloads.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            loops_failed: self.loops_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub references_ingested: u64,
    pub references_rejected: u64,
    pub source_messages: u64,
    pub forwarded: u64,
    pub dropped: u64,
    pub invalid_payloads: u64,
    pub write_failures: u64,
    pub loops_failed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopKind {
    Reference,
    Source,
}

impl fmt::Display for LoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => f.write_str("reference"),
            Self::Source => f.write_str("source"),
        }
    }
}

struct RoutePlan {
    matcher: Arc<Matcher>,
    reference_group: String,
    reference_topics: Vec<String>,
    source: Arc<dyn Transport>,
    source_group: String,
    source_topics: Vec<String>,
    destination: String,
}

type LoopResult = (String, LoopKind, Result<LoopExit, TransportError>);

pub struct Bridge {
    plans: Vec<RoutePlan>,
    matchers: Arc<Matchers>,
    bridge_transport: Arc<dyn Transport>,
    writers: Arc<WriterPool>,
    stats: Arc<Stats>,
    tasks: JoinSet<LoopResult>,
}

impl Bridge {
    /// Builds a matcher and loop plan for every route.
    ///
    /// `source_transports` is keyed by source cluster name. Fails on a
    /// duplicate route identifier, a malformed feed, or a route whose
    /// source cluster has no transport.
    pub fn new(
        config: &Config,
        store: Arc<MatchStore>,
        bridge_transport: Arc<dyn Transport>,
        source_transports: &HashMap<String, Arc<dyn Transport>>,
    ) -> Result<Self, BridgeError> {
        let mut matchers = Matchers::new();
        let mut plans = Vec::with_capacity(config.routes.len());

        for route in &config.routes {
            let id = route.id();
            let route_err = |message: String| BridgeError::Route {
                route: route.display_name().to_string(),
                message,
            };

            if matchers.contains_key(&id) {
                return Err(route_err(format!("duplicate route id '{id}'")));
            }

            let cluster = config
                .source_cluster_for(route)
                .ok_or_else(|| route_err("no matching source cluster".to_string()))?;
            let source = source_transports
                .get(&cluster.name)
                .cloned()
                .ok_or_else(|| route_err(format!("no transport for source cluster '{}'", cluster.name)))?;

            let matcher = Matcher::new(&id, &route.reference_feeds, Arc::clone(&store))
                .map(Arc::new)
                .map_err(|e| route_err(e.to_string()))?;

            matchers.insert(id.clone(), Arc::clone(&matcher));
            plans.push(RoutePlan {
                matcher,
                reference_group: format!("{}-{id}", config.reference_group_id),
                reference_topics: route.reference_topics(),
                source,
                source_group: format!("{}-{id}", cluster.source_group_id),
                source_topics: route.source_topics(),
                destination: route.destination_topic.clone(),
            });
        }

        Ok(Self {
            plans,
            matchers: Arc::new(matchers),
            writers: Arc::new(WriterPool::new(Arc::clone(&bridge_transport))),
            bridge_transport,
            stats: Arc::new(Stats::new()),
            tasks: JoinSet::new(),
        })
    }

    #[must_use]
    pub fn matchers(&self) -> Arc<Matchers> {
        Arc::clone(&self.matchers)
    }

    #[must_use]
    pub fn stats(&self) -> Arc<Stats> {
        Arc::clone(&self.stats)
    }

    #[must_use]
    pub fn writers(&self) -> Arc<WriterPool> {
        Arc::clone(&self.writers)
    }

    /// Starts the reference and source loops of every route.
    pub fn spawn(&mut self, cancel: &CancellationToken) {
        for plan in &self.plans {
            let route = plan.matcher.route_id().to_string();

            let collector = ReferenceCollector {
                matcher: Arc::clone(&plan.matcher),
                transport: Arc::clone(&self.bridge_transport),
                group_id: plan.reference_group.clone(),
                topics: plan.reference_topics.clone(),
                stats: Arc::clone(&self.stats),
            };
            let token = cancel.clone();
            let id = route.clone();
            self.tasks.spawn(async move {
                (id, LoopKind::Reference, collector.run(token).await)
            });

            let streamer = SourceStreamer {
                matcher: Arc::clone(&plan.matcher),
                transport: Arc::clone(&plan.source),
                group_id: plan.source_group.clone(),
                topics: plan.source_topics.clone(),
                destination: plan.destination.clone(),
                writers: Arc::clone(&self.writers),
                stats: Arc::clone(&self.stats),
            };
            let token = cancel.clone();
            self.tasks.spawn(async move {
                (route, LoopKind::Source, streamer.run(token).await)
            });
        }
        tracing::info!(routes = self.plans.len(), loops = self.tasks.len(), "route loops started");
    }

    /// Waits for every route loop and returns how many stopped on an error.
    pub async fn join(&mut self) -> usize {
        let mut failed = 0;
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((route, kind, Ok(LoopExit::Cancelled))) => {
                    tracing::debug!(route = %route, kind = %kind, "route loop cancelled");
                }
                Ok((route, kind, Err(e))) => {
                    failed += 1;
                    tracing::debug!(route = %route, kind = %kind, error = %e, "failed route loop joined");
                }
                Err(e) => {
                    failed += 1;
                    tracing::error!(error = %e, "route loop panicked");
                }
            }
        }
        failed
    }

    /// Flushes and closes every destination writer.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.writers.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{
        AdminConfig, ClusterConfig, ReferenceFeed, Route, SourceCluster, StartOffset,
        StorageConfig,
    };
    use crate::transport::memory::MemoryTransport;

    fn route(name: &str, cluster: &str) -> Route {
        Route {
            name: Some(name.into()),
            source_cluster: Some(cluster.into()),
            source_topic: Some("in".into()),
            source_topics: vec![],
            destination_topic: "out".into(),
            reference_feeds: vec![ReferenceFeed {
                name: None,
                topic: "ref".into(),
                topic_headers: vec![],
                match_fields: vec!["id".into()],
            }],
        }
    }

    fn config(routes: Vec<Route>) -> Config {
        Config {
            client_id: "bridge".into(),
            reference_group_id: "refs".into(),
            commit_interval_ms: 5000,
            start_offset: StartOffset::Latest,
            bridge_cluster: ClusterConfig::default(),
            source_cluster: None,
            source_clusters: vec![SourceCluster {
                name: "eu".into(),
                brokers: vec!["eu:9092".into()],
                tls: None,
                source_group_id: "src".into(),
            }],
            routes,
            admin: AdminConfig::default(),
            storage: StorageConfig::default(),
        }
    }

    fn transports() -> HashMap<String, Arc<dyn Transport>> {
        HashMap::from([(
            "eu".to_string(),
            Arc::new(MemoryTransport::new("eu")) as Arc<dyn Transport>,
        )])
    }

    #[test]
    fn builds_one_matcher_per_route() {
        let bridge = Bridge::new(
            &config(vec![route("Orders EU", "eu"), route("returns", "eu")]),
            Arc::new(MatchStore::new()),
            Arc::new(MemoryTransport::new("bridge")),
            &transports(),
        )
        .unwrap();
        let ids: Vec<_> = bridge.matchers().keys().cloned().collect();
        assert_eq!(ids, vec!["orders-eu", "returns"]);
    }

    #[test]
    fn duplicate_route_ids_are_fatal() {
        let result = Bridge::new(
            &config(vec![route("orders", "eu"), route("Orders", "eu")]),
            Arc::new(MatchStore::new()),
            Arc::new(MemoryTransport::new("bridge")),
            &transports(),
        );
        assert!(matches!(result, Err(BridgeError::Route { .. })));
    }

    #[test]
    fn missing_source_transport_is_fatal() {
        let result = Bridge::new(
            &config(vec![route("orders", "us")]),
            Arc::new(MatchStore::new()),
            Arc::new(MemoryTransport::new("bridge")),
            &transports(),
        );
        assert!(matches!(result, Err(BridgeError::Route { .. })));
    }

    #[test]
    fn stats_snapshot_reads_counters() {
        let stats = Stats::new();
        stats.forwarded.fetch_add(2, Ordering::Relaxed);
        stats.dropped.fetch_add(1, Ordering::Relaxed);
        let snap = stats.snapshot();
        assert_eq!(snap.forwarded, 2);
        assert_eq!(snap.dropped, 1);
        assert_eq!(snap.write_failures, 0);
        assert_eq!(snap.loops_failed, 0);
    }
}
