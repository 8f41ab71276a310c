//! `GET /health` endpoint handler.
//!
//! Returns a [`HealthResponse`] JSON payload containing the bridge
//! version, uptime, config source metadata, per-route cache sizes, and
//! cumulative pipeline statistics.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::bridge::StatsSnapshot;
use crate::config::ConfigVersion;
use crate::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub config: ConfigHealth,
    pub cache: CacheHealth,
    pub stats: StatsSnapshot,
}

#[derive(Serialize, Deserialize)]
pub struct ConfigHealth {
    pub source: String,
    pub version: String,
    pub loaded_ago_seconds: u64,
    pub routes: usize,
    pub reference_feeds: usize,
}

#[derive(Serialize, Deserialize)]
pub struct CacheHealth {
    pub total: usize,
    pub routes: BTreeMap<String, usize>,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let loaded = &state.config;
    let version = match &loaded.version {
        ConfigVersion::Hash(h) => h.get(..8).unwrap_or(h).to_string(),
    };

    let routes: BTreeMap<String, usize> = state
        .matchers
        .iter()
        .map(|(id, matcher)| (id.clone(), matcher.size()))
        .collect();

    let stats = state.stats.snapshot();
    let status = if stats.loops_failed > 0 {
        "degraded"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        config: ConfigHealth {
            source: loaded.source_name.clone(),
            version,
            loaded_ago_seconds: loaded.loaded_at.elapsed().as_secs(),
            routes: loaded.config.routes.len(),
            reference_feeds: loaded.config.total_feeds(),
        },
        cache: CacheHealth {
            total: state.store.total(),
            routes,
        },
        stats,
    })
}
