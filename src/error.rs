// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::services::geometry::GeometryError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Credential failures raised by the token gate.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("No stored credential for athlete {0}")]
    MissingCredential(u64),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Re-authorization required: {0}")]
    Auth(#[from] AuthError),

    #[error("Strava transport error: {0}")]
    Transport(String),

    #[error("Strava API error: HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    /// Sync skips bad geometry per record, so this is only built by
    /// callers that surface a geometry failure directly.
    #[error("Geometry error: {0}")]
    Geometry(GeometryError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True when the user has to connect their Strava account again.
    pub fn needs_reauthorization(&self) -> bool {
        matches!(self, AppError::Auth(_))
    }

    /// HTTP status reported by Strava, if this error came from a response.
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            AppError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Auth(err) => (
                StatusCode::UNAUTHORIZED,
                "reauthorization_required",
                Some(err.to_string()),
            ),
            AppError::Transport(msg) => {
                (StatusCode::BAD_GATEWAY, "strava_unreachable", Some(msg.clone()))
            }
            AppError::Remote { status, .. } => (
                StatusCode::BAD_GATEWAY,
                "strava_error",
                Some(format!("HTTP {}", status)),
            ),
            AppError::Geometry(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_geometry",
                Some(err.to_string()),
            ),
            AppError::Cancelled => (StatusCode::CONFLICT, "cancelled", None),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
