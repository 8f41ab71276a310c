//! Serde data structures for the matchbridge configuration file.
//!
//! Contains [`Config`] (the root), the cluster descriptions
//! ([`ClusterConfig`], [`SourceCluster`], [`TlsConfig`]), [`Route`] and
//! [`ReferenceFeed`], plus the admin listener and storage sections. All
//! types derive `Serialize` and `Deserialize` with `deny_unknown_fields`
//! for strict parsing.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const fn default_commit_interval_ms() -> u64 {
    5000
}

const fn default_flush_interval_secs() -> u64 {
    10
}

const fn default_true() -> bool {
    true
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

/// Name given to the cluster declared with the single `source_cluster` key.
pub const DEFAULT_SOURCE_CLUSTER: &str = "default";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub client_id: String,

    pub reference_group_id: String,

    #[serde(default = "default_commit_interval_ms")]
    pub commit_interval_ms: u64,

    #[serde(default)]
    pub start_offset: StartOffset,

    pub bridge_cluster: ClusterConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_cluster: Option<SourceClusterSettings>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_clusters: Vec<SourceCluster>,

    pub routes: Vec<Route>,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    #[must_use]
    pub const fn commit_interval(&self) -> Duration {
        Duration::from_millis(self.commit_interval_ms)
    }

    /// Every source cluster, with the single-cluster form named
    /// [`DEFAULT_SOURCE_CLUSTER`].
    #[must_use]
    pub fn all_source_clusters(&self) -> Vec<SourceCluster> {
        let mut clusters = Vec::with_capacity(self.source_clusters.len() + 1);
        if let Some(single) = &self.source_cluster {
            clusters.push(SourceCluster {
                name: DEFAULT_SOURCE_CLUSTER.to_string(),
                brokers: single.brokers.clone(),
                tls: single.tls.clone(),
                source_group_id: single.source_group_id.clone(),
            });
        }
        clusters.extend(self.source_clusters.iter().cloned());
        clusters
    }

    /// The cluster a route reads from. An unnamed route uses the only
    /// configured cluster.
    #[must_use]
    pub fn source_cluster_for(&self, route: &Route) -> Option<SourceCluster> {
        let clusters = self.all_source_clusters();
        match &route.source_cluster {
            Some(name) => clusters.into_iter().find(|c| &c.name == name),
            None if clusters.len() == 1 => clusters.into_iter().next(),
            None => None,
        }
    }

    #[must_use]
    pub fn total_feeds(&self) -> usize {
        self.routes.iter().map(|r| r.reference_feeds.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StartOffset {
    #[default]
    Latest,
    Earliest,
}

impl StartOffset {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Earliest => "earliest",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    pub brokers: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,

    #[serde(default)]
    pub insecure_skip_verify: bool,
}

/// Cluster settings for the single `source_cluster` form.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourceClusterSettings {
    pub brokers: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,

    pub source_group_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourceCluster {
    pub name: String,

    pub brokers: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,

    pub source_group_id: String,
}

impl SourceCluster {
    #[must_use]
    pub fn cluster(&self) -> ClusterConfig {
        ClusterConfig {
            brokers: self.brokers.clone(),
            tls: self.tls.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Route {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_cluster: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_topic: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_topics: Vec<String>,

    pub destination_topic: String,

    pub reference_feeds: Vec<ReferenceFeed>,
}

impl Route {
    /// Human-facing name: `name` when set, else the destination topic.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.destination_topic,
        }
    }

    /// Cache and consumer-group key derived from [`Route::display_name`].
    #[must_use]
    pub fn id(&self) -> String {
        slug(self.display_name())
    }

    /// The single and list forms merged, in declaration order, without
    /// duplicates.
    #[must_use]
    pub fn source_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = Vec::with_capacity(self.source_topics.len() + 1);
        for topic in self.source_topic.iter().chain(&self.source_topics) {
            if !topics.contains(topic) {
                topics.push(topic.clone());
            }
        }
        topics
    }

    /// Distinct reference topics in feed order.
    #[must_use]
    pub fn reference_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = Vec::with_capacity(self.reference_feeds.len());
        for feed in &self.reference_feeds {
            if !topics.contains(&feed.topic) {
                topics.push(feed.topic.clone());
            }
        }
        topics
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceFeed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub topic: String,

    /// Required `key=value` message headers; keys compare case-insensitively.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topic_headers: Vec<String>,

    pub match_fields: Vec<String>,
}

impl ReferenceFeed {
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.topic,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AdminConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            listen_addr: default_listen_addr(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    #[serde(default)]
    pub reset_on_startup: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            flush_interval_secs: default_flush_interval_secs(),
            reset_on_startup: false,
        }
    }
}

impl StorageConfig {
    #[must_use]
    pub const fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

/// Lowercases and replaces ` `, `/`, `\` and `.` with `-`.
#[must_use]
pub fn slug(input: &str) -> String {
    input
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' | '.' => '-',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(name: Option<&str>, destination: &str) -> Route {
        Route {
            name: name.map(String::from),
            source_cluster: None,
            source_topic: Some("orders".into()),
            source_topics: vec!["orders".into(), "returns".into()],
            destination_topic: destination.into(),
            reference_feeds: vec![],
        }
    }

    #[test]
    fn slug_normalizes_separators() {
        assert_eq!(slug("Orders EU/v1.raw\\x"), "orders-eu-v1-raw-x");
    }

    #[test]
    fn route_id_falls_back_to_destination() {
        assert_eq!(route(Some("EU Orders"), "dst").id(), "eu-orders");
        assert_eq!(route(None, "bridge.orders.filtered").id(), "bridge-orders-filtered");
        assert_eq!(route(Some(""), "dst").display_name(), "dst");
    }

    #[test]
    fn source_topic_forms_merge() {
        assert_eq!(route(None, "dst").source_topics(), vec!["orders", "returns"]);
    }

    #[test]
    fn single_source_cluster_is_named_default() {
        let config: Config = serde_json::from_str(
            r#"{
                "client_id": "c",
                "reference_group_id": "ref",
                "bridge_cluster": {"brokers": ["b:9092"]},
                "source_cluster": {"brokers": ["s:9092"], "source_group_id": "src"},
                "routes": []
            }"#,
        )
        .unwrap();
        let clusters = config.all_source_clusters();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].name, DEFAULT_SOURCE_CLUSTER);
        assert_eq!(config.admin.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.storage.flush_interval_secs, 10);
        assert_eq!(config.start_offset, StartOffset::Latest);
    }
}
