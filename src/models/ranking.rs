// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Weekly squad ranking models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::MissionType;
use crate::time_utils::{iso_week_bounds, iso_week_id};

/// Leaderboard container for one squad and one ISO week.
///
/// Stored at: `weekly_rankings/{squad_code}_{week_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyRanking {
    pub id: String,
    pub squad_code: String,
    /// ISO week ("YYYY-WW")
    pub week_id: String,
    /// Monday 00:00:00 UTC
    pub week_start: DateTime<Utc>,
    /// Sunday 23:59:59 UTC
    pub week_end: DateTime<Utc>,
    /// Set once by the weekly rollover; the winner is announced with it
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

impl WeeklyRanking {
    pub fn document_id(squad_code: &str, week_id: &str) -> String {
        format!("{squad_code}_{week_id}")
    }

    /// Ranking for the ISO week containing `at`.
    pub fn for_week(squad_code: &str, at: DateTime<Utc>) -> Self {
        let week_id = iso_week_id(at);
        let (week_start, week_end) = iso_week_bounds(at);
        Self {
            id: Self::document_id(squad_code, &week_id),
            squad_code: squad_code.to_string(),
            week_id,
            week_start,
            week_end,
            closed_at: None,
        }
    }
}

/// One user's standing inside a weekly ranking.
///
/// Stored at: `weekly_rankings/{ranking_id}/entries/{user_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub user_id: String,
    /// Denormalized from the user when the entry was created
    pub name: String,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub weekly_xp: u64,
    /// Missions credited since the last daily reset; no duplicates
    #[serde(default)]
    pub today_missions: Vec<MissionType>,
    pub last_updated: DateTime<Utc>,
}

/// Ranking row returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RankedUser {
    /// 1-based
    pub position: u32,
    pub user_id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub weekly_xp: u64,
    pub today_missions: Vec<MissionType>,
    pub is_current_user: bool,
}

/// A user's place in their squad this week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserPosition {
    pub position: u32,
    pub total_users: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub weekly_xp: u64,
}

/// Top entry of a closed week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyWinner {
    pub squad_code: String,
    pub week_id: String,
    pub user_id: String,
    pub name: String,
    pub weekly_xp: u64,
}
