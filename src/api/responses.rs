/// Standardized API response types with enhanced error handling
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::utils::error::SentinelError;

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the operation was successful
    pub success: bool,
    /// Response data (present on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error information (present on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    /// Request timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Standardized error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl<T> ApiResponse<T> {
    /// Create a successful response
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Create an error response
    pub fn error(code: &str, message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.to_string(),
                message: message.to_string(),
            }),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Map sentinel errors onto HTTP status codes without leaking store
/// internals to callers.
fn status_for(error: &SentinelError) -> StatusCode {
    match error {
        SentinelError::Validation { .. } => StatusCode::BAD_REQUEST,
        SentinelError::NotFound { .. } => StatusCode::NOT_FOUND,
        SentinelError::DeadlineExceeded { .. } | SentinelError::Cancelled { .. } => {
            StatusCode::GATEWAY_TIMEOUT
        }
        SentinelError::StoreUnavailable { .. } | SentinelError::StoreQueryFailed { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        SentinelError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Public-facing message. Store failures get a generic line; everything
/// else is safe to echo.
fn public_message(error: &SentinelError) -> String {
    match error {
        SentinelError::StoreUnavailable { .. } | SentinelError::StoreQueryFailed { .. } => {
            "metric store unavailable".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for SentinelError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let body: ApiResponse<()> = ApiResponse::error(self.code(), &public_message(&self));
        (status, Json(body)).into_response()
    }
}
