// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Scheduler trigger routes.
//!
//! These endpoints are called by an external scheduler, not directly by
//! users. They are guarded by the `x-scheduler-token` middleware.

use crate::services::JobReport;
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use std::sync::Arc;

/// Task handler routes (called by the scheduler).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks/weekly-rollover", post(weekly_rollover))
        .route("/tasks/daily-reset", post(daily_reset))
        .route("/tasks/reminders", post(reminders))
}

/// Close last week's rankings, notify winners, open the new week.
async fn weekly_rollover(State(state): State<Arc<AppState>>) -> Json<JobReport> {
    tracing::info!("Weekly rollover triggered");
    Json(state.jobs.weekly_rollover().await)
}

async fn daily_reset(State(state): State<Arc<AppState>>) -> Json<JobReport> {
    tracing::info!("Daily reset triggered");
    Json(state.jobs.daily_reset().await)
}

async fn reminders(State(state): State<Arc<AppState>>) -> Json<JobReport> {
    tracing::debug!("Reminders triggered");
    Json(state.jobs.send_reminders().await)
}
