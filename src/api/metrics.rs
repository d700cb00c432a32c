//! Prometheus metrics endpoint.

use axum::{extract::State, http::header, response::IntoResponse};

use crate::error::{AppError, Result};
use crate::metrics::{self, QueueMetrics};
use crate::server::AppState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /metrics - Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let stats = state.registry.stats();
    QueueMetrics::set_registry_gauges(stats.channels, stats.pending);

    let output = metrics::encode_metrics()
        .map_err(|e| AppError::Internal(format!("failed to encode metrics: {}", e)))?;

    Ok(([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], output))
}
