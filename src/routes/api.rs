// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for the caller's own profile and account.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::services::{NewProfile, Notification, ProfileView, SettingsUpdate};
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me).post(create_me))
        .route("/api/me/settings", put(update_settings))
        .route("/api/account", delete(delete_account))
        .route("/api/notifications/test", post(send_test_notification))
}

// ─── User Profile ────────────────────────────────────────────

/// Get current user profile with level progress.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ProfileView>> {
    Ok(Json(state.users.get_profile(&user.user_id).await?))
}

/// Create the caller's profile on first sign-in.
async fn create_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<NewProfile>,
) -> Result<(StatusCode, Json<ProfileView>)> {
    let profile = state.users.create_profile(&user.user_id, body).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<SettingsUpdate>,
) -> Result<Json<ProfileView>> {
    Ok(Json(state.users.update_settings(&user.user_id, body).await?))
}

// ─── Account Deletion ────────────────────────────────────────

/// Response for account deletion.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteAccountResponse {
    pub success: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub documents_deleted: usize,
}

/// Delete the user's account and all associated data.
///
/// Runs inline: the squad slot is released, then ranking entries, missions
/// and finally the profile are removed.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<DeleteAccountResponse>> {
    tracing::info!(user_id = %user.user_id, "User-initiated account deletion");

    let documents_deleted = state.users.delete_account(&user.user_id).await?;

    Ok(Json(DeleteAccountResponse {
        success: true,
        documents_deleted,
    }))
}

// ─── Notifications ───────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TestNotificationResponse {
    pub sent: bool,
}

/// Push a test notification to the caller's registered device.
async fn send_test_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TestNotificationResponse>> {
    let profile = state.users.get_profile(&user.user_id).await?;
    let sent = state
        .notifier
        .notify(&profile.user, &Notification::Test)
        .await;
    Ok(Json(TestNotificationResponse { sent }))
}
