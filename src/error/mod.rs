use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::queue::QueueError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            AppError::Queue(QueueError::NegativeDuration { .. }) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            AppError::Queue(QueueError::ChannelLimit { .. }) => {
                (StatusCode::TOO_MANY_REQUESTS, "CHANNEL_LIMIT")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let log_message = match &self {
            AppError::Validation(msg) | AppError::NotFound(msg) | AppError::Internal(msg) => {
                msg.clone()
            }
            AppError::Queue(e) => e.to_string(),
        };
        let client_message = if status.is_server_error() && is_production() {
            "Internal server error".to_string()
        } else {
            log_message.clone()
        };

        // Always log the detailed error server-side
        if status.is_server_error() {
            tracing::error!(
                code = %code,
                status = %status.as_u16(),
                message = %log_message,
                "API error"
            );
        } else {
            tracing::debug!(
                code = %code,
                status = %status.as_u16(),
                message = %log_message,
                "API request rejected"
            );
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: client_message,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (AppError::NotFound("channel x".into()), StatusCode::NOT_FOUND),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                AppError::Queue(QueueError::NegativeDuration {
                    name: "window",
                    value_ms: -5,
                }),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Queue(QueueError::ChannelLimit { max: 1 }),
                StatusCode::TOO_MANY_REQUESTS,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_queue_error_message() {
        let error = AppError::from(QueueError::NegativeDuration {
            name: "delay",
            value_ms: -1,
        });
        assert_eq!(
            error.to_string(),
            "Queue error: delay must be non-negative, got -1 ms"
        );
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = AppError::Queue(QueueError::ChannelLimit { max: 3 }).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "CHANNEL_LIMIT");
        assert_eq!(body["error"]["message"], "channel limit of 3 reached");
    }
}
