//! Gateway error types and HTTP response handling.
//!
//! Error bodies are deliberately generic: a 404 never says whether the
//! tenant, the endpoint, or an inactive flag caused it, and upstream or
//! facilitator failure detail stays in the logs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use tollgate_db::DbError;

/// Gateway-specific errors with structured responses.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Unknown tenant, unknown endpoint, inactive endpoint, or reserved
    /// slug. The cases are deliberately indistinguishable.
    #[error("Not found")]
    NotFound,

    /// Endpoint has no resolvable recipient address. The detail is
    /// server-side only.
    #[error("Endpoint misconfigured: {0}")]
    Misconfigured(String),

    /// Request rejected by the rate limiter.
    #[error("Rate limit exceeded. Try again in {retry_after} seconds.")]
    RateLimited { retry_after: u64 },

    /// Payment verification failed.
    #[error("Payment verification failed")]
    PaymentInvalid { reason: String },

    /// Upstream could not be reached.
    #[error("Upstream request failed")]
    UpstreamUnreachable(String),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Database failure.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Any uncategorized failure.
    #[error("Internal gateway error: {0}")]
    Internal(String),
}

/// Structured error response returned to clients.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl GatewayError {
    /// Get the error code string for the response.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            GatewayError::NotFound => "NOT_FOUND",
            GatewayError::Misconfigured(_) => "MISCONFIGURED",
            GatewayError::RateLimited { .. } => "RATE_LIMITED",
            GatewayError::PaymentInvalid { .. } => "PAYMENT_INVALID",
            GatewayError::UpstreamUnreachable(_) => "UPSTREAM_UNREACHABLE",
            GatewayError::BadRequest(_) => "BAD_REQUEST",
            GatewayError::Database(_) | GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::Misconfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::PaymentInvalid { .. } => StatusCode::PAYMENT_REQUIRED,
            GatewayError::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Database(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The client-visible message for this error.
    ///
    /// Server-side detail (misconfiguration strings, upstream transport
    /// errors, database errors) is replaced with an opaque message.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::Misconfigured(_) => "Endpoint is not configured correctly".to_string(),
            GatewayError::UpstreamUnreachable(_) => "Upstream request failed".to_string(),
            GatewayError::Database(_) | GatewayError::Internal(_) => {
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            GatewayError::Misconfigured(detail) => {
                tracing::error!(detail = %detail, "Endpoint misconfigured");
            }
            GatewayError::UpstreamUnreachable(detail) => {
                tracing::warn!(detail = %detail, "Upstream unreachable");
            }
            GatewayError::Database(err) => {
                tracing::error!(error = %err, "Database error");
            }
            GatewayError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal error");
            }
            _ => {}
        }

        let (reason, retry_after) = match &self {
            GatewayError::PaymentInvalid { reason } => (Some(reason.clone()), None),
            GatewayError::RateLimited { retry_after } => (None, Some(*retry_after)),
            _ => (None, None),
        };

        let body = ErrorResponse {
            error: self.error_code().to_string(),
            message: self.public_message(),
            reason,
            retry_after,
        };

        let mut response = (status, Json(body)).into_response();

        if let GatewayError::RateLimited { retry_after } = &self {
            if let Ok(value) = retry_after.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }

        response
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
