//! Administrative cache endpoints.
//!
//! Manual value injection for one route or all routes, single reference
//! records pushed through a feed, and read/clear access to the whole
//! store. Routing lives in [`crate::server::build_router`].

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};

use crate::engine::MatchError;
use crate::server::AppState;
use crate::store::Snapshot;

#[derive(Debug, Serialize, Deserialize)]
pub struct AddedResponse {
    pub route: String,
    pub added: bool,
    pub cached: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AllRoutesResponse {
    pub added: bool,
    pub routes: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub removed: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

const fn added_status(added: bool) -> StatusCode {
    if added {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

/// Parses a non-empty JSON array of strings.
fn parse_values(body: &[u8]) -> Result<Vec<String>, Response> {
    let values: Vec<String> = serde_json::from_slice(body).map_err(|e| {
        error(
            StatusCode::BAD_REQUEST,
            format!("expected a JSON array of strings: {e}"),
        )
    })?;
    if values.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "no values provided"));
    }
    Ok(values)
}

pub async fn get_cache(State(state): State<Arc<AppState>>) -> Json<Snapshot> {
    Json(state.store.snapshot())
}

pub async fn clear_cache(State(state): State<Arc<AppState>>) -> Json<ClearResponse> {
    let removed = state.store.clear();
    tracing::info!(removed, "cache cleared");
    Json(ClearResponse { removed })
}

pub async fn add_route_values(
    State(state): State<Arc<AppState>>,
    Path(route): Path<String>,
    body: Bytes,
) -> Response {
    let Some(matcher) = state.matchers.get(&route) else {
        return error(StatusCode::NOT_FOUND, format!("unknown route '{route}'"));
    };
    let values = match parse_values(&body) {
        Ok(values) => values,
        Err(response) => return response,
    };

    let added = matcher.add_values(&values);
    tracing::info!(route = %route, values = values.len(), added, "manual values injected");
    (
        added_status(added),
        Json(AddedResponse {
            route,
            added,
            cached: matcher.size(),
        }),
    )
        .into_response()
}

pub async fn add_all_routes_values(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let values = match parse_values(&body) {
        Ok(values) => values,
        Err(response) => return response,
    };

    // Every route is attempted; no short-circuit.
    let added = state
        .matchers
        .values()
        .fold(false, |acc, matcher| matcher.add_values(&values) | acc);
    tracing::info!(
        routes = state.matchers.len(),
        values = values.len(),
        added,
        "manual values injected into all routes"
    );
    (
        added_status(added),
        Json(AllRoutesResponse {
            added,
            routes: state.matchers.len(),
        }),
    )
        .into_response()
}

pub async fn add_reference(
    State(state): State<Arc<AppState>>,
    Path((route, topic)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(matcher) = state.matchers.get(&route) else {
        return error(StatusCode::NOT_FOUND, format!("unknown route '{route}'"));
    };

    // HeaderMap names are already lowercase.
    let headers: HashMap<String, String> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    match matcher.process_reference(&topic, &headers, &body) {
        Ok(ingested) => {
            tracing::info!(
                route = %route,
                feed = %ingested.feed,
                added = ingested.added,
                "manual reference ingested"
            );
            (
                added_status(ingested.added),
                Json(AddedResponse {
                    route,
                    added: ingested.added,
                    cached: matcher.size(),
                }),
            )
                .into_response()
        }
        Err(e) => {
            let status = match e {
                MatchError::NoMatchingFeed { .. } => StatusCode::NOT_FOUND,
                MatchError::Field { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::BAD_REQUEST,
            };
            error(status, e.to_string())
        }
    }
}
