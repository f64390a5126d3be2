// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Weekly leaderboard routes for the caller's squad.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{RankedUser, UserPosition};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/ranking", get(get_ranking))
        .route("/api/ranking/position", get(get_position))
}

/// Squad the caller currently belongs to.
async fn caller_squad(state: &AppState, user_id: &str) -> Result<String> {
    let user = state
        .db
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))?;
    user.squad_code
        .ok_or_else(|| AppError::NotFound("User is not in a squad".to_string()))
}

#[derive(Deserialize)]
struct RankingQuery {
    /// Page size; capped server-side
    limit: Option<usize>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RankingResponse {
    pub squad_code: String,
    pub ranking_id: String,
    pub entries: Vec<RankedUser>,
}

async fn get_ranking(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<RankingQuery>,
) -> Result<Json<RankingResponse>> {
    let squad_code = caller_squad(&state, &user.user_id).await?;
    let entries = state
        .ranking
        .get_ranking(&squad_code, &user.user_id, params.limit)
        .await?;

    Ok(Json(RankingResponse {
        ranking_id: state.ranking.current_ranking_id(&squad_code),
        squad_code,
        entries,
    }))
}

/// The caller's position, or `null` before their first XP this week.
async fn get_position(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Option<UserPosition>>> {
    let squad_code = caller_squad(&state, &user.user_id).await?;
    let position = state
        .ranking
        .get_user_position(&squad_code, &user.user_id)
        .await?;
    Ok(Json(position))
}
