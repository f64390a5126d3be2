//! User profile model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::services::{leveling, streak};
use crate::time_utils::local_date;

/// User profile and progression.
///
/// Stored at: `users/{user_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Auth subject (also used as document ID)
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    /// Squad membership; absent when not in a squad
    #[serde(default)]
    pub squad_code: Option<String>,
    /// Cached level, always `level_for_total_xp(total_xp)`
    pub level: u32,
    #[serde(default)]
    pub total_xp: u64,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    /// Local day of the last XP-earning event
    #[serde(default)]
    pub last_completed_date: Option<NaiveDate>,
    /// Local day the daily bonus was last granted
    #[serde(default)]
    pub bonus_awarded_date: Option<NaiveDate>,
    /// Set when the user created a squad
    #[serde(default)]
    pub is_coach: bool,
    /// Push delivery target
    #[serde(default)]
    pub device_token: Option<String>,
    #[serde(default = "default_notifications_enabled")]
    pub notifications_enabled: bool,
    /// Fixed offset of the user's local day from UTC
    #[serde(default)]
    pub utc_offset_minutes: i32,
    pub created_at: DateTime<Utc>,
}

fn default_notifications_enabled() -> bool {
    true
}

/// Effect of crediting XP to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpAward {
    pub previous_level: u32,
    pub new_level: u32,
}

impl XpAward {
    pub fn leveled_up(&self) -> bool {
        self.new_level > self.previous_level
    }
}

impl User {
    pub fn new(id: &str, name: &str, email: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            email,
            avatar_url: None,
            squad_code: None,
            level: 1,
            total_xp: 0,
            current_streak: 0,
            longest_streak: 0,
            last_completed_date: None,
            bonus_awarded_date: None,
            is_coach: false,
            device_token: None,
            notifications_enabled: true,
            utc_offset_minutes: 0,
            created_at: now,
        }
    }

    /// The user's local calendar day at `now`.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        local_date(now, self.utc_offset_minutes)
    }

    /// Credit XP earned on `today`: total, cached level and streak move together.
    pub fn award_xp(&mut self, amount: u32, today: NaiveDate) -> XpAward {
        let previous_level = self.level;
        self.total_xp = self.total_xp.saturating_add(u64::from(amount));
        self.level = leveling::level_for_total_xp(self.total_xp);

        let update = streak::apply(
            self.current_streak,
            self.longest_streak,
            self.last_completed_date,
            today,
        );
        self.current_streak = update.current;
        self.longest_streak = update.longest;
        self.last_completed_date = Some(update.last_completed);

        XpAward {
            previous_level,
            new_level: self.level,
        }
    }

    /// Whether push messages can reach this user.
    pub fn can_receive_push(&self) -> bool {
        self.notifications_enabled && self.device_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}
