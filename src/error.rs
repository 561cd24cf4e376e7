//! Error handling module
//!
//! Translates domain errors into HTTP responses. The body shape is stable:
//! `{code, message, details, traceId}` with `code` drawn from a closed set.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::{DomainError, RequestContext};

/// Result type for HTTP route handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// A domain error joined with the request's trace id.
#[derive(Debug)]
pub struct ApiError {
    error: DomainError,
    trace_id: String,
}

impl ApiError {
    pub fn new(error: DomainError, trace_id: impl Into<String>) -> Self {
        Self {
            error,
            trace_id: trace_id.into(),
        }
    }

    /// Attach the trace id from the request context.
    pub fn with_ctx(error: DomainError, ctx: &RequestContext) -> Self {
        Self::new(error, ctx.trace_id())
    }

    pub fn error(&self) -> &DomainError {
        &self.error
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub details: Vec<ErrorDetail>,
    #[serde(rename = "traceId")]
    pub trace_id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self.error {
            DomainError::Validation { details } => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "invalid request".to_string(),
                details
                    .iter()
                    .map(|d| ErrorDetail {
                        field: d.field.clone(),
                        message: d.message.clone(),
                    })
                    .collect(),
            ),

            DomainError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "NOT_AUTHORIZED",
                self.error.to_string(),
                Vec::new(),
            ),

            DomainError::Unauthorized { .. } => (
                StatusCode::FORBIDDEN,
                "NOT_AUTHORIZED",
                self.error.to_string(),
                Vec::new(),
            ),

            DomainError::NotFound { .. } => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                self.error.to_string(),
                Vec::new(),
            ),

            DomainError::InvalidTransition { .. } => (
                StatusCode::CONFLICT,
                "INVALID_STATUS_TRANSITION",
                self.error.to_string(),
                Vec::new(),
            ),

            DomainError::Conflict { .. } => (
                StatusCode::CONFLICT,
                "CONCURRENT_MODIFICATION",
                self.error.to_string(),
                Vec::new(),
            ),

            DomainError::Storage { retryable, message } => {
                tracing::error!(
                    trace_id = %self.trace_id,
                    retryable,
                    error = %message,
                    "storage error"
                );
                let status = if *retryable {
                    StatusCode::SERVICE_UNAVAILABLE
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                (status, "INTERNAL_ERROR", "internal error".to_string(), Vec::new())
            }
        };

        let body = ErrorBody {
            code,
            message,
            details,
            trace_id: self.trace_id,
        };

        (status, Json(body)).into_response()
    }
}
