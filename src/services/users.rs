// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User profiles, settings and account deletion.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::db::{paths, Db, Write};
use crate::error::AppError;
use crate::models::User;
use crate::services::leveling::{progress_in_current_level, LevelProgress};
use crate::services::squads::SquadRegistry;
use crate::time_utils::Clock;

/// Fields accepted when creating a profile.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewProfile {
    #[validate(length(min = 2, max = 50))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(url)]
    pub avatar_url: Option<String>,
    /// -12:00 to +14:00
    #[validate(range(min = -720, max = 840))]
    pub utc_offset_minutes: Option<i32>,
    pub device_token: Option<String>,
}

/// Partial settings update; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SettingsUpdate {
    pub notifications_enabled: Option<bool>,
    #[validate(length(max = 4096))]
    pub device_token: Option<String>,
    #[validate(range(min = -720, max = 840))]
    pub utc_offset_minutes: Option<i32>,
}

/// Profile plus derived level progress.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub user: User,
    pub progress: LevelProgress,
}

impl From<User> for ProfileView {
    fn from(user: User) -> Self {
        let progress = progress_in_current_level(user.total_xp);
        Self { user, progress }
    }
}

fn invalid(e: validator::ValidationErrors) -> AppError {
    AppError::BadRequest(e.to_string())
}

#[derive(Clone)]
pub struct UserService {
    db: Db,
    clock: Arc<dyn Clock>,
    squads: SquadRegistry,
}

impl UserService {
    pub fn new(db: Db, clock: Arc<dyn Clock>, squads: SquadRegistry) -> Self {
        Self { db, clock, squads }
    }

    pub async fn create_profile(
        &self,
        user_id: &str,
        mut input: NewProfile,
    ) -> Result<ProfileView, AppError> {
        input.name = input.name.trim().to_string();
        input.validate().map_err(invalid)?;

        let mut user = User::new(user_id, &input.name, input.email, self.clock.now());
        user.avatar_url = input.avatar_url;
        user.device_token = input.device_token.filter(|t| !t.is_empty());
        user.utc_offset_minutes = input.utc_offset_minutes.unwrap_or(0);

        match self.db.create_user(&user).await {
            Ok(()) => {}
            Err(AppError::Contention(_)) => {
                return Err(AppError::BadRequest("Profile already exists".to_string()))
            }
            Err(e) => return Err(e),
        }

        tracing::info!(user_id, "Profile created");
        Ok(user.into())
    }

    pub async fn get_profile(&self, user_id: &str) -> Result<ProfileView, AppError> {
        self.db
            .get_user(user_id)
            .await?
            .map(ProfileView::from)
            .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))
    }

    pub async fn update_settings(
        &self,
        user_id: &str,
        update: SettingsUpdate,
    ) -> Result<ProfileView, AppError> {
        update.validate().map_err(invalid)?;
        let update = &update;

        let user = self
            .db
            .run_transaction("update_settings", || async move {
                let snap = self.db.get_doc(&paths::user(user_id)).await?;
                let mut user: User = snap
                    .decode()?
                    .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))?;

                if let Some(enabled) = update.notifications_enabled {
                    user.notifications_enabled = enabled;
                }
                if let Some(token) = &update.device_token {
                    user.device_token = Some(token.clone()).filter(|t| !t.is_empty());
                }
                if let Some(offset) = update.utc_offset_minutes {
                    user.utc_offset_minutes = offset;
                }

                self.db
                    .commit(vec![Write::set(snap.path.clone(), &user)?.when(snap.unchanged())])
                    .await?;
                Ok(user)
            })
            .await?;

        tracing::debug!(user_id, "Settings updated");
        Ok(user.into())
    }

    /// Remove the account and everything that references it.
    ///
    /// The squad slot is released in the same commit that deletes the
    /// profile. A join or mission that read the profile first makes that
    /// commit conflict and is undone on retry; one that reads it afterwards
    /// finds no user.
    ///
    /// Returns the number of documents deleted.
    pub async fn delete_account(&self, user_id: &str) -> Result<usize, AppError> {
        let left = self
            .db
            .run_transaction("delete_account", || async move {
                let snap = self.db.get_doc(&paths::user(user_id)).await?;
                let user: User = snap
                    .decode()?
                    .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))?;

                let mut writes = self.squads.release_writes(&user).await?;
                writes.push(Write::delete(snap.path.clone()).when(snap.unchanged()));
                self.db.commit(writes).await?;
                Ok(user.squad_code)
            })
            .await?;

        if let Some(code) = &left {
            tracing::info!(user_id, squad_code = %code, "Left squad");
        }

        // The profile went with the commit above.
        let deleted = 1 + self.db.delete_user_data(user_id).await?;

        tracing::info!(user_id, deleted, "Account deleted");
        Ok(deleted)
    }
}
