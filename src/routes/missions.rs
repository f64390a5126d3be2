// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mission routes: today's missions, photo completion and hydration.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Mission, MissionType};
use crate::services::MissionOutcome;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/missions/today", get(get_today))
        .route("/api/missions/{mission_type}/complete", post(complete_mission))
        .route("/api/missions/hydration", put(update_hydration))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TodayMissionsResponse {
    pub missions: Vec<Mission>,
    pub completed: u32,
    pub total: u32,
}

/// Missions recorded for the caller's current local day.
async fn get_today(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TodayMissionsResponse>> {
    let missions = state.missions.get_today_missions(&user.user_id).await?;
    let completed = missions.iter().filter(|m| m.counts_as_complete()).count();

    Ok(Json(TodayMissionsResponse {
        completed: u32::try_from(completed).unwrap_or(u32::MAX),
        total: u32::try_from(MissionType::ALL.len()).unwrap_or(u32::MAX),
        missions,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompleteMissionRequest {
    #[validate(length(min = 1, max = 2048))]
    pub photo_url: String,
}

async fn complete_mission(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(mission_type): Path<String>,
    Json(body): Json<CompleteMissionRequest>,
) -> Result<Json<MissionOutcome>> {
    let mission_type: MissionType = mission_type.parse().map_err(AppError::BadRequest)?;
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let outcome = state
        .missions
        .complete_mission(&user.user_id, mission_type, &body.photo_url)
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct HydrationRequest {
    /// Out-of-range counts are clamped to 0..=5
    pub glasses: i64,
}

async fn update_hydration(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<HydrationRequest>,
) -> Result<Json<MissionOutcome>> {
    let outcome = state
        .missions
        .update_hydration(&user.user_id, body.glasses)
        .await?;
    Ok(Json(outcome))
}
