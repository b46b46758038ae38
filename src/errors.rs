use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::ai_strategies::AiServiceError;
use crate::api::ApiResponse;

/// Detail payload for a rejected bulk accept, precise enough for the
/// caller to render remaining capacity.
#[derive(Debug, Clone, Serialize)]
pub struct CapacityDetails {
    pub generated_count: i32,
    pub current_accepted_count: i32,
    pub requested_count: i32,
    pub available_slots: i32,
}

/// Centralized error types for consistent API error handling
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Generation capacity exceeded: {} of {} slots used, {} requested",
        .0.current_accepted_count, .0.generated_count, .0.requested_count)]
    CapacityExceeded(CapacityDetails),

    #[error("Daily generation limit reached, retry after {retry_after}")]
    RateLimitExceeded { retry_after: DateTime<Utc> },

    #[error("AI service error: {0}")]
    AiService(#[from] AiServiceError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Error context for structured logging
#[derive(Debug)]
pub struct ErrorContext {
    pub operation: String,
    pub resource_id: Option<String>,
    pub resource_type: String,
}

impl ErrorContext {
    pub fn new(operation: &str, resource_type: &str) -> Self {
        Self {
            operation: operation.to_string(),
            resource_id: None,
            resource_type: resource_type.to_string(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }
}

impl ApiError {
    /// Convert API error to HTTP response with consistent structure and
    /// logging. AI failures keep their detailed classification in the log
    /// while the body stays generic.
    pub fn to_response_with_context(self, context: ErrorContext) -> Response {
        match &self {
            ApiError::NotFound(_) => {
                info!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Resource not found"
                );
                (
                    StatusCode::NOT_FOUND,
                    Json(ApiResponse::<()>::error(self.to_string())),
                )
                    .into_response()
            }
            ApiError::ValidationError(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Validation error"
                );
                (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::<()>::error(self.to_string())),
                )
                    .into_response()
            }
            ApiError::CapacityExceeded(details) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    generated_count = details.generated_count,
                    current_accepted_count = details.current_accepted_count,
                    requested_count = details.requested_count,
                    available_slots = details.available_slots,
                    "Bulk accept rejected, capacity exceeded"
                );
                let body = ApiResponse::<()>::error_with_details(
                    self.to_string(),
                    json!(details),
                );
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            ApiError::RateLimitExceeded { retry_after } => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    retry_after = %retry_after,
                    "Daily generation limit reached"
                );
                let retry_at = retry_after.to_rfc3339();
                let body = ApiResponse::<()>::error_with_details(
                    self.to_string(),
                    json!({ "retry_after": retry_at }),
                );
                let mut response =
                    (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                if let Ok(value) = HeaderValue::from_str(&retry_at) {
                    response.headers_mut().insert(RETRY_AFTER, value);
                }
                response
            }
            ApiError::AiService(ai_error) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error_code = ai_error.code(),
                    error = %ai_error,
                    "AI service error"
                );
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(ApiResponse::<()>::error(
                        "AI service temporarily unavailable. Please try again.".to_string(),
                    )),
                )
                    .into_response()
            }
            ApiError::DatabaseError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Database error"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::<()>::error(
                        "Database operation failed. Please try again.".to_string(),
                    )),
                )
                    .into_response()
            }
            ApiError::InternalError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Internal server error"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::<()>::error(
                        "An internal error occurred. Please try again.".to_string(),
                    )),
                )
                    .into_response()
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(anyhow::Error::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_creation() {
        let context = ErrorContext::new("bulk_accept", "generation").with_id("123");

        assert_eq!(context.operation, "bulk_accept");
        assert_eq!(context.resource_type, "generation");
        assert_eq!(context.resource_id, Some("123".to_string()));
    }

    #[test]
    fn test_status_code_mapping() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (
                ApiError::NotFound("generation missing".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::ValidationError("too short".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::CapacityExceeded(CapacityDetails {
                    generated_count: 5,
                    current_accepted_count: 5,
                    requested_count: 1,
                    available_slots: 0,
                }),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::RateLimitExceeded { retry_after: Utc::now() },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                ApiError::AiService(AiServiceError::Timeout("slow".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::InternalError("counters stale".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let context = ErrorContext::new("test", "resource");
            let response = err.to_response_with_context(context);
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_rate_limit_sets_retry_after_header() {
        let retry_after = Utc::now();
        let err = ApiError::RateLimitExceeded { retry_after };
        let response = err.to_response_with_context(ErrorContext::new("generate", "generation"));

        let header = response.headers().get(RETRY_AFTER).unwrap();
        assert_eq!(header.to_str().unwrap(), retry_after.to_rfc3339());
    }

    #[test]
    fn test_capacity_message_names_counts() {
        let err = ApiError::CapacityExceeded(CapacityDetails {
            generated_count: 5,
            current_accepted_count: 5,
            requested_count: 1,
            available_slots: 0,
        });
        let message = err.to_string();
        assert!(message.contains("5 of 5"));
        assert!(message.contains("1 requested"));
    }
}
