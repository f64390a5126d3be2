// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scheduler trigger authentication middleware.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Header carrying the shared scheduler secret.
pub const SCHEDULER_TOKEN_HEADER: &str = "x-scheduler-token";

/// Require a matching `x-scheduler-token` header for `/tasks/*` routes.
pub async fn require_scheduler_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let expected = state.config.scheduler_token.as_bytes();
    if expected.is_empty() {
        tracing::error!("Blocked tasks request: no scheduler token configured");
        return Err(StatusCode::FORBIDDEN);
    }

    let provided = request
        .headers()
        .get(SCHEDULER_TOKEN_HEADER)
        .map(|h| h.as_bytes())
        .unwrap_or_default();

    if !bool::from(provided.ct_eq(expected)) {
        tracing::warn!(
            present = !provided.is_empty(),
            "Blocked tasks request with invalid scheduler token"
        );
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}
