//! Channel endpoints: publish, poll for the next message, and per-channel stats.

use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::message::{MessageType, PubSubMessage};
use crate::queue::{saturating_millis, QueueError};
use crate::server::AppState;

/// Request to publish a message on a channel
#[derive(Debug, Deserialize)]
pub struct PublishMessageRequest {
    /// Explicit message id; generated when absent
    pub id: Option<Uuid>,
    /// Creation time; now when absent
    pub timestamp: Option<DateTime<Utc>>,
    /// Originating principal
    pub sender: Uuid,
    /// Destination principals
    pub receivers: Vec<Uuid>,
    /// Opaque payload
    pub content: String,
    /// Payload type
    #[serde(default, rename = "type")]
    pub message_type: MessageType,
    /// Lifetime in milliseconds; makes the message transient
    pub lifetime_ms: Option<i64>,
}

impl PublishMessageRequest {
    fn into_message(self) -> Result<PubSubMessage> {
        if self.receivers.is_empty() {
            return Err(AppError::Validation(
                "receivers must contain at least one id".to_string(),
            ));
        }

        let mut builder = PubSubMessage::builder(self.sender, self.receivers, self.content)
            .message_type(self.message_type);
        if let Some(id) = self.id {
            if id == PubSubMessage::NO_MESSAGE_ID {
                return Err(AppError::Validation("the nil id is reserved".to_string()));
            }
            builder = builder.id(id);
        }
        if let Some(timestamp) = self.timestamp {
            builder = builder.timestamp(timestamp);
        }
        if let Some(lifetime_ms) = self.lifetime_ms {
            builder = builder.lifetime(QueueError::non_negative_millis("lifetime", lifetime_ms)?);
        }

        Ok(builder.build())
    }
}

/// Response for publish operations
#[derive(Debug, Serialize, Deserialize)]
pub struct PublishMessageResponse {
    /// False when a message with the same id is still pending
    pub accepted: bool,
    pub message_id: Uuid,
    pub channel: String,
    pub total_messages: u64,
}

#[derive(Debug, Deserialize)]
pub struct PeakLoadQuery {
    /// Peak-load window in milliseconds; configured default when absent
    pub window_ms: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelStatsResponse {
    pub channel: String,
    pub delay_ms: u64,
    pub pending: usize,
    pub total_messages: u64,
    pub history_len: usize,
    pub window_ms: u64,
    pub peak_load: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelListResponse {
    pub channels: Vec<String>,
    pub total_channels: usize,
}

/// POST /api/v1/channels/{channel}/messages - Publish a message
pub async fn publish_message(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Json(request): Json<PublishMessageRequest>,
) -> Result<(StatusCode, Json<PublishMessageResponse>)> {
    let message = request.into_message()?;
    let message_id = message.id();

    let queue = state.registry.get_or_create(&channel)?;
    let accepted = queue.add(message);
    let total_messages = queue.total_message_count();

    tracing::info!(
        channel = %channel,
        message_id = %message_id,
        accepted = accepted,
        "Message published"
    );

    let status = if accepted {
        StatusCode::CREATED
    } else {
        StatusCode::CONFLICT
    };

    Ok((
        status,
        Json(PublishMessageResponse {
            accepted,
            message_id,
            channel,
            total_messages,
        }),
    ))
}

/// GET /api/v1/channels/{channel}/next - Take the next deliverable message.
///
/// 204 means nothing is eligible yet; callers poll.
pub async fn next_message(State(state): State<AppState>, Path(channel): Path<String>) -> Response {
    let next = state.registry.get(&channel).and_then(|queue| queue.retrieve());

    match next {
        Some(message) => {
            tracing::info!(channel = %channel, message_id = %message.id(), "Message delivered");
            (StatusCode::OK, Json(message)).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// GET /api/v1/channels/{channel}/stats - Counters and peak load for a channel
pub async fn channel_stats(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Query(query): Query<PeakLoadQuery>,
) -> Result<Json<ChannelStatsResponse>> {
    let queue = state
        .registry
        .get(&channel)
        .ok_or_else(|| AppError::NotFound(format!("channel '{}'", channel)))?;

    let window = match query.window_ms {
        Some(ms) => QueueError::non_negative_millis("window", ms)?,
        None => Duration::from_millis(state.settings.queue.default_peak_window_ms),
    };
    let peak_load = queue.peak_load(window);
    let stats = queue.stats();

    Ok(Json(ChannelStatsResponse {
        channel,
        delay_ms: stats.delay_ms,
        pending: stats.pending,
        total_messages: stats.total_messages,
        history_len: stats.history_len,
        window_ms: saturating_millis(window),
        peak_load,
    }))
}

/// DELETE /api/v1/channels/{channel} - Drop a channel and its pending messages
pub async fn delete_channel(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<StatusCode> {
    let queue = state
        .registry
        .remove(&channel)
        .ok_or_else(|| AppError::NotFound(format!("channel '{}'", channel)))?;

    tracing::info!(channel = %channel, dropped = queue.len(), "Channel deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/channels - List channels with a queue
pub async fn list_channels(State(state): State<AppState>) -> Json<ChannelListResponse> {
    let channels = state.registry.channels();
    let total_channels = channels.len();

    Json(ChannelListResponse {
        channels,
        total_channels,
    })
}
