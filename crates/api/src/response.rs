//! Standardized API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use inbox_core::{ItemId, ItemStatus, QueueItem};
use queue_store::StatusCounts;
use serde::{Deserialize, Serialize};

/// Acknowledgement for an enqueued message.
#[derive(Debug, Serialize, Deserialize)]
pub struct AckResponse {
    pub accepted: bool,
    pub id: ItemId,
    pub status: ItemStatus,
    pub timestamp: i64,
}

impl AckResponse {
    pub fn pending(id: ItemId) -> Self {
        Self {
            accepted: true,
            id,
            status: ItemStatus::Pending,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Page of queue items.
#[derive(Debug, Serialize, Deserialize)]
pub struct ItemList {
    pub count: usize,
    pub items: Vec<QueueItem>,
}

impl From<Vec<QueueItem>> for ItemList {
    fn from(items: Vec<QueueItem>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store_connected: bool,
    pub ai_available: bool,
    pub vault_available: bool,
    pub queue_depth: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<StatusCounts>,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = Some(details);
        self
    }
}

/// API error carrying an HTTP status and an error code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ErrorResponse,
}

impl ApiError {
    pub fn with_code(status: StatusCode, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            response: ErrorResponse::new(msg, code),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_REQUEST, "VALID_001", msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::FORBIDDEN, "AUTH_005", msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::INTERNAL_SERVER_ERROR, "DB_001", msg)
    }

    pub fn validation(status: StatusCode, code: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            status,
            response: ErrorResponse::new("Validation failed", code).with_details(errors),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<inbox_core::Error> for ApiError {
    fn from(err: inbox_core::Error) -> Self {
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match &err {
            inbox_core::Error::ValidationWithCode { code, message, .. } => {
                ApiError::validation(status, *code, vec![message.clone()])
            }
            _ => ApiError::with_code(status, err.error_code(), err.to_string()),
        }
    }
}
