//! Error handling and HTTP error conversion
//!
//! Engine errors are converted to HTTP responses with a status code and a
//! machine-readable error code. Internal details of store or client failures
//! are logged server-side and never returned to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use webhook_core::{EngineError, StoreError, ValidationError};

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Standard error response for all API errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Additional context (optional, type varies by error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error returned from handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Engine(EngineError::Validation(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::Engine(err) => convert_engine_error(err),
            ApiError::Internal(_) => internal_error(),
        };

        log_error(&self, status);

        (status, Json(error_response)).into_response()
    }
}

/// Map an engine error to its HTTP status and response body.
pub(crate) fn convert_engine_error(error: &EngineError) -> (StatusCode, ErrorResponse) {
    match error {
        EngineError::Validation(err) => (
            StatusCode::BAD_REQUEST,
            error_response(
                "ValidationError",
                err.to_string(),
                err.field().map(|field| json!({ "field": field })),
            ),
        ),
        EngineError::WebhookNotFound { id } | EngineError::Store(StoreError::WebhookNotFound(id)) => (
            StatusCode::NOT_FOUND,
            error_response(
                "NotFound",
                format!("Webhook not found: {id}"),
                Some(json!({ "webhookId": id })),
            ),
        ),
        EngineError::DeliveryNotFound { id }
        | EngineError::Store(StoreError::DeliveryNotFound(id)) => (
            StatusCode::NOT_FOUND,
            error_response(
                "NotFound",
                format!("Delivery not found: {id}"),
                Some(json!({ "deliveryId": id })),
            ),
        ),
        EngineError::DeliveryNotClaimable { id, status } => (
            StatusCode::CONFLICT,
            error_response(
                "Conflict",
                error.to_string(),
                Some(json!({ "deliveryId": id, "status": status })),
            ),
        ),
        EngineError::Store(StoreError::Unavailable { .. }) => (
            StatusCode::SERVICE_UNAVAILABLE,
            error_response(
                "ServiceUnavailable",
                "The service is temporarily unavailable, retry later".to_string(),
                None,
            ),
        ),
        EngineError::Serialization(_) | EngineError::HttpClient(_) => internal_error(),
    }
}

fn internal_error() -> (StatusCode, ErrorResponse) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        error_response(
            "InternalError",
            "An internal error occurred".to_string(),
            None,
        ),
    )
}

fn error_response(
    code: &str,
    message: String,
    details: Option<serde_json::Value>,
) -> ErrorResponse {
    ErrorResponse {
        error: ErrorDetails {
            code: code.to_string(),
            message,
            details,
        },
    }
}

/// Log error with appropriate level based on HTTP status
fn log_error(error: &ApiError, status: StatusCode) {
    if status.is_server_error() {
        tracing::error!(status = %status, error = %error, "API error");
    } else {
        tracing::warn!(status = %status, error = %error, "API error");
    }
}
