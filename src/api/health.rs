//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::queue::RegistryStats;
use crate::server::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub queues: RegistryStats,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        queues: state.registry.stats(),
    })
}
