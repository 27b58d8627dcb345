//! Error handling for the Songline API
//!
//! This module provides a unified error type using thiserror, with
//! automatic HTTP status code mapping via Axum's IntoResponse trait.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for client-side handling
    pub code: &'static str,
    /// Human-readable error message
    pub message: String,
}

/// Main API error type
#[derive(Error, Debug)]
pub enum ApiError {
    // ========== Validation Errors ==========
    /// Request validation failed
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Invalid request body or socket envelope
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    // ========== Authorization ==========
    /// Caller is not allowed to perform the action (e.g. not the host)
    #[error("forbidden: {0}")]
    Forbidden(String),

    // ========== Resource Errors ==========
    /// Requested resource not found
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// Wrong turn, player or phase for the requested transition
    #[error("conflict: {0}")]
    Conflict(String),

    // ========== Resource Exhaustion ==========
    /// Not enough playable cards to start or deal
    #[error("deck too small: {available} playable cards, {required} required")]
    DeckTooSmall { available: usize, required: usize },

    /// Deck ran out while dealing opening cards
    #[error("deck exhausted")]
    DeckExhausted,

    // ========== External Service Errors ==========
    /// Provider credentials missing or rejected and not refreshable
    #[error("playback provider authentication failed: {0}")]
    InvalidToken(String),

    /// Playback control failed
    #[error("playback provider error: {0}")]
    Playback(String),

    /// Catalog fetch failed
    #[error("catalog error: {0}")]
    Catalog(String),

    /// External call exceeded its time budget
    #[error("{0} timed out")]
    Timeout(&'static str),

    // ========== Configuration Errors ==========
    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    // ========== Internal Errors ==========
    /// Internal server error (catch-all for unexpected errors)
    #[error("internal server error: {0}")]
    Internal(String),

    /// JSON serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            Self::ValidationError(_) | Self::InvalidBody(_) => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            Self::Forbidden(_) => StatusCode::FORBIDDEN,

            // 404 Not Found
            Self::NotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::Conflict(_) => StatusCode::CONFLICT,

            // 422 Unprocessable Entity
            Self::DeckTooSmall { .. } | Self::DeckExhausted | Self::Serialization(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            // 502 Bad Gateway (external service errors)
            Self::Playback(_) | Self::Catalog(_) => StatusCode::BAD_GATEWAY,

            // 504 Gateway Timeout
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,

            // 500 Internal Server Error
            Self::Configuration(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for client-side handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidBody(_) => "INVALID_BODY",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::DeckTooSmall { .. } => "DECK_TOO_SMALL",
            Self::DeckExhausted => "DECK_EXHAUSTED",
            Self::InvalidToken(_) => "INVALID_TOKEN",
            Self::Playback(_) => "PLAYBACK_ERROR",
            Self::Catalog(_) => "CATALOG_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Create a not found error for a specific resource
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict(reason.into())
    }

    /// Whether the error is a conflict (wrong turn, player or phase)
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Log the error with appropriate severity based on status code
    pub fn log(&self) {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(
                error = %self,
                code = self.error_code(),
                status = status.as_u16(),
                "Server error occurred"
            );
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::warn!(
                error = %self,
                code = self.error_code(),
                status = status.as_u16(),
                "Authorization error"
            );
        } else {
            tracing::debug!(
                error = %self,
                code = self.error_code(),
                status = status.as_u16(),
                "Client error"
            );
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status_code();
        let error_response = ErrorResponse {
            code: self.error_code(),
            message: self.to_string(),
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        Self::InvalidBody(rejection.body_text())
    }
}
