use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::server::AppState;

use super::channels::{
    channel_stats, delete_channel, list_channels, next_message, publish_message,
};
use super::health::{health, stats};
use super::metrics::prometheus_metrics;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health, stats & metrics
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Channel endpoints
        .nest(
            "/api/v1",
            Router::new()
                .route("/channels", get(list_channels))
                .route("/channels/{channel}", delete(delete_channel))
                .route("/channels/{channel}/messages", post(publish_message))
                .route("/channels/{channel}/next", get(next_message))
                .route("/channels/{channel}/stats", get(channel_stats)),
        )
}
