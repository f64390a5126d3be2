// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Squad routes: create, inspect, join, leave and delete.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::Squad;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/squads", post(create_squad))
        .route("/api/squads/join", post(join_squad))
        .route("/api/squads/leave", post(leave_squad))
        .route("/api/squads/{code}", get(get_squad).delete(delete_squad))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSquadRequest {
    #[validate(length(max = 200))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct JoinSquadRequest {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LeaveSquadResponse {
    pub left: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteSquadResponse {
    pub success: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub members_removed: usize,
}

fn invalid(e: validator::ValidationErrors) -> AppError {
    AppError::BadRequest(e.to_string())
}

/// Create a squad; the caller becomes its owner and first member.
async fn create_squad(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateSquadRequest>,
) -> Result<(StatusCode, Json<Squad>)> {
    body.validate().map_err(invalid)?;
    let squad = state.squads.create_squad(&body.name, &user.user_id).await?;
    Ok((StatusCode::CREATED, Json(squad)))
}

async fn get_squad(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<Squad>> {
    Ok(Json(state.squads.get_squad(&code).await?))
}

async fn join_squad(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<JoinSquadRequest>,
) -> Result<Json<Squad>> {
    body.validate().map_err(|_| AppError::InvalidSquadCode)?;
    Ok(Json(state.squads.join_squad(&user.user_id, &body.code).await?))
}

async fn leave_squad(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<LeaveSquadResponse>> {
    let left = state.squads.leave_squad(&user.user_id).await?;
    Ok(Json(LeaveSquadResponse { left }))
}

/// Owner-only: remove every member, then the squad.
async fn delete_squad(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(code): Path<String>,
) -> Result<Json<DeleteSquadResponse>> {
    let members_removed = state.squads.delete_squad(&code, &user.user_id).await?;
    Ok(Json(DeleteSquadResponse {
        success: true,
        members_removed,
    }))
}
