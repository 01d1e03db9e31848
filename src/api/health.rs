//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::broadcast::EngineStatsSnapshot;
use crate::room::RegistryStats;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub rooms: usize,
    pub members: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub registry: RegistryStats,
    pub broadcast: EngineStatsSnapshot,
}

/// GET / - service banner
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "WebSocket Chat Server" }))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.relay.registry.stats();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        rooms: registry.total_rooms,
        members: registry.total_members,
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        registry: state.relay.registry.stats(),
        broadcast: state.relay.engine.stats(),
    })
}
