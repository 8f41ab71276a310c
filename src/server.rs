//! Axum admin server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared state holding the match store,
//! route matchers, stats, and uptime), [`build_router`] for constructing
//! the Axum router with middleware layers, and [`shutdown_signal`] for
//! SIGTERM / Ctrl+C handling.

use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::admin;
use crate::bridge::{Matchers, Stats};
use crate::config::model::Config;
use crate::config::ConfigVersion;
use crate::health::health_handler;
use crate::store::MatchStore;

/// Default request body limit for admin endpoints.
pub const MAX_BODY: usize = 1_048_576;

#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Arc<Config>,
    pub version: ConfigVersion,
    pub source_name: String,
    pub loaded_at: Instant,
}

pub struct AppState {
    pub config: LoadedConfig,
    pub store: Arc<MatchStore>,
    pub matchers: Arc<Matchers>,
    pub stats: Arc<Stats>,
    pub start_time: Instant,
}

pub fn build_router(state: Arc<AppState>, max_body: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/cache", get(admin::get_cache))
        .route("/cache/clear", post(admin::clear_cache))
        .route("/reference/{route}", post(admin::add_route_values))
        .route("/reference/{route}/{topic}", post(admin::add_reference))
        .route("/referenceAllRoutes", post(admin::add_all_routes_values))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body)),
        )
        .with_state(state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
