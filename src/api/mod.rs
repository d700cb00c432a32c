//! API layer - HTTP endpoint handlers.

mod channels;
mod health;
mod metrics;
mod routes;

pub use channels::{
    channel_stats, delete_channel, list_channels, next_message, publish_message,
    ChannelListResponse, ChannelStatsResponse, PeakLoadQuery, PublishMessageRequest,
    PublishMessageResponse,
};
pub use health::{health, stats, HealthResponse, StatsResponse};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
