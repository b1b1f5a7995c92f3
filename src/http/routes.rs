use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::{Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::managers::ClientRegistry;
use crate::relay::{RelayStats, RelayStatsSnapshot};

use super::ws;

const HEALTH_PATH: &str = "/health";

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct RelayHttpState {
    pub registry: Arc<ClientRegistry>,
    pub stats: Arc<RelayStats>,
    outbound_capacity: usize,
}

impl RelayHttpState {
    pub fn new(
        registry: Arc<ClientRegistry>,
        stats: Arc<RelayStats>,
        outbound_capacity: usize,
    ) -> Self {
        Self {
            registry,
            stats,
            outbound_capacity: outbound_capacity.max(1),
        }
    }
}

/// Health endpoint response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub clients: usize,
    pub stats: RelayStatsSnapshot,
}

/// Build the Axum router with the stream endpoint mounted at `ws_path`.
pub fn build_router(state: RelayHttpState, ws_path: &str) -> Router {
    let ws_path = normalize_path(ws_path);
    let router = Router::new().route(&ws_path, get(stream_upgrade));
    let router = if ws_path == HEALTH_PATH {
        log::warn!("[Http] Stream path shadows {}; health route disabled", HEALTH_PATH);
        router
    } else {
        router.route(HEALTH_PATH, get(health))
    };
    router.with_state(state)
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

async fn stream_upgrade(
    upgrade: WebSocketUpgrade,
    State(state): State<RelayHttpState>,
) -> Response {
    upgrade.on_upgrade(move |socket| {
        ws::serve_client(socket, state.registry, state.outbound_capacity)
    })
}

pub async fn health(State(state): State<RelayHttpState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        clients: state.registry.len(),
        stats: state.stats.snapshot(),
    })
}
