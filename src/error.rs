// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use crate::db::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Mission already completed today")]
    AlreadyCompleted,

    #[error("Mission type does not take a photo")]
    PhotoNotRequired,

    #[error("Invalid squad code")]
    InvalidSquadCode,

    #[error("Squad not found")]
    SquadNotFound,

    #[error("Squad is full")]
    SquadFull,

    #[error("Only the squad owner can do this")]
    NotOwner,

    #[error("Could not generate a unique squad code")]
    CodeGenerationFailed,

    /// Optimistic concurrency conflicts that persisted through every retry.
    #[error("Store contention: {0}")]
    Contention(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidToken => "invalid_token",
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::AlreadyCompleted => "already_completed",
            AppError::PhotoNotRequired => "photo_not_required",
            AppError::InvalidSquadCode => "invalid_squad_code",
            AppError::SquadNotFound => "squad_not_found",
            AppError::SquadFull => "squad_full",
            AppError::NotOwner => "not_owner",
            AppError::CodeGenerationFailed => "code_generation_failed",
            AppError::Contention(_) => "contention",
            AppError::Database(_) => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// True for failures caused by benign contention that a retry may clear.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Contention(_))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(path) => AppError::Contention(path),
            other => AppError::Database(other.to_string()),
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
        let (status, details) = match &self {
            AppError::Unauthorized | AppError::InvalidToken => (StatusCode::UNAUTHORIZED, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, Some(msg.clone())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, Some(msg.clone())),
            AppError::AlreadyCompleted => (StatusCode::CONFLICT, Some(self.to_string())),
            AppError::PhotoNotRequired | AppError::InvalidSquadCode => {
                (StatusCode::BAD_REQUEST, Some(self.to_string()))
            }
            AppError::SquadNotFound => (StatusCode::NOT_FOUND, Some(self.to_string())),
            AppError::SquadFull => (StatusCode::CONFLICT, Some(self.to_string())),
            AppError::NotOwner => (StatusCode::FORBIDDEN, Some(self.to_string())),
            AppError::CodeGenerationFailed => {
                tracing::error!("Squad code generation exhausted its attempts");
                (StatusCode::SERVICE_UNAVAILABLE, Some(self.to_string()))
            }
            AppError::Contention(path) => {
                tracing::warn!(path = %path, "Store contention persisted after retries");
                (StatusCode::SERVICE_UNAVAILABLE, None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        let body = ErrorResponse {
            error: self.code().to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
