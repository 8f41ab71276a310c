//! Per-route matcher tying feeds, extraction and the shared store together.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::fields::{extract_match_values, flatten_values, FieldError};
use super::variants::year_variants;
use crate::config::model::ReferenceFeed;
use crate::store::MatchStore;

#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("no match fields configured for topic {topic} with provided headers")]
    NoMatchingFeed { topic: String },

    #[error("feed {feed}: invalid payload: {source}")]
    InvalidPayload {
        feed: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid payload: {0}")]
    InvalidSourcePayload(#[source] serde_json::Error),

    #[error("feed {feed}: {source}")]
    Field {
        feed: String,
        #[source]
        source: FieldError,
    },

    #[error("invalid topic header {0:?} (expected key=value)")]
    InvalidTopicHeader(String),
}

/// Outcome of ingesting one reference payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingested {
    /// At least one value was new to the store.
    pub added: bool,
    /// Display name of the feed that matched.
    pub feed: String,
}

/// A configured reference feed with its header filter pre-parsed.
#[derive(Debug, Clone)]
pub struct FeedMatcher {
    pub name: String,
    pub topic: String,
    /// Lowercased header keys mapped to required values.
    pub topic_headers: HashMap<String, String>,
    pub fields: Vec<String>,
}

impl FeedMatcher {
    pub fn from_config(feed: &ReferenceFeed) -> Result<Self, MatchError> {
        Ok(Self {
            name: feed.display_name().to_string(),
            topic: feed.topic.clone(),
            topic_headers: parse_topic_headers(&feed.topic_headers)?,
            fields: feed.match_fields.clone(),
        })
    }

    fn accepts(&self, topic: &str, headers: &HashMap<String, String>) -> bool {
        self.topic == topic && headers_match(&self.topic_headers, headers)
    }
}

pub struct Matcher {
    route_id: String,
    feeds: Vec<FeedMatcher>,
    store: Arc<MatchStore>,
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("route_id", &self.route_id)
            .field("feeds", &self.feeds)
            .finish_non_exhaustive()
    }
}

impl Matcher {
    pub fn new(
        route_id: impl Into<String>,
        feeds: &[ReferenceFeed],
        store: Arc<MatchStore>,
    ) -> Result<Self, MatchError> {
        let feeds = feeds
            .iter()
            .map(FeedMatcher::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            route_id: route_id.into(),
            feeds,
            store,
        })
    }

    #[must_use]
    pub fn route_id(&self) -> &str {
        &self.route_id
    }

    #[must_use]
    pub fn feeds(&self) -> &[FeedMatcher] {
        &self.feeds
    }

    /// First feed, in configuration order, whose topic and required
    /// headers match. `headers` must be keyed by lowercase name.
    #[must_use]
    pub fn feed_for(&self, topic: &str, headers: &HashMap<String, String>) -> Option<&FeedMatcher> {
        self.feeds.iter().find(|f| f.accepts(topic, headers))
    }

    /// Ingests one reference payload and caches every extracted value.
    pub fn process_reference(
        &self,
        topic: &str,
        headers: &HashMap<String, String>,
        payload: &[u8],
    ) -> Result<Ingested, MatchError> {
        let feed = self
            .feed_for(topic, headers)
            .ok_or_else(|| MatchError::NoMatchingFeed {
                topic: topic.to_string(),
            })?;

        let body: Map<String, Value> =
            serde_json::from_slice(payload).map_err(|source| MatchError::InvalidPayload {
                feed: feed.name.clone(),
                source,
            })?;

        let values =
            extract_match_values(&body, feed.fields.as_slice()).map_err(|source| MatchError::Field {
                feed: feed.name.clone(),
                source,
            })?;

        Ok(Ingested {
            added: self.insert_all(values.iter().map(String::as_str)),
            feed: feed.name.clone(),
        })
    }

    /// True when any leaf anywhere in the payload is cached for this route.
    pub fn should_forward(&self, payload: &[u8]) -> Result<bool, MatchError> {
        let body: Value = serde_json::from_slice(payload).map_err(MatchError::InvalidSourcePayload)?;

        let found = flatten_values(&body).any(|leaf| {
            year_variants(&leaf)
                .iter()
                .any(|variant| self.store.contains(&self.route_id, variant))
        });
        Ok(found)
    }

    /// Caches caller-supplied raw values. Returns whether anything was new.
    pub fn add_values<S: AsRef<str>>(&self, values: &[S]) -> bool {
        self.insert_all(values.iter().map(|v| v.as_ref()))
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.store.size(&self.route_id)
    }

    fn insert_all<'a>(&self, values: impl Iterator<Item = &'a str>) -> bool {
        let mut added = false;
        for value in values {
            for variant in year_variants(value) {
                // No short-circuit: every variant must land in the store.
                added |= self.store.add(&self.route_id, variant);
            }
        }
        added
    }
}

/// Parses `key=value` entries into a lowercase-keyed map.
pub fn parse_topic_headers(raw: &[String]) -> Result<HashMap<String, String>, MatchError> {
    raw.iter()
        .map(|kv| match kv.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_lowercase(), value.to_string())),
            _ => Err(MatchError::InvalidTopicHeader(kv.clone())),
        })
        .collect()
}

fn headers_match(expected: &HashMap<String, String>, actual: &HashMap<String, String>) -> bool {
    expected
        .iter()
        .all(|(key, value)| actual.get(key).is_some_and(|v| v == value))
}
