// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily mission model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// XP for each photo mission.
pub const PHOTO_MISSION_XP: u32 = 50;
/// XP per glass of water.
pub const XP_PER_GLASS: u32 = 10;
/// Glasses counted toward hydration per day.
pub const MAX_GLASSES: u32 = 5;

/// The six daily missions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum MissionType {
    Breakfast,
    Lunch,
    Snack,
    Dinner,
    Workout,
    Hydration,
}

impl MissionType {
    pub const ALL: [MissionType; 6] = [
        MissionType::Breakfast,
        MissionType::Lunch,
        MissionType::Snack,
        MissionType::Dinner,
        MissionType::Workout,
        MissionType::Hydration,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MissionType::Breakfast => "breakfast",
            MissionType::Lunch => "lunch",
            MissionType::Snack => "snack",
            MissionType::Dinner => "dinner",
            MissionType::Workout => "workout",
            MissionType::Hydration => "hydration",
        }
    }

    /// Everything except hydration is proven with a photo.
    pub fn requires_photo(self) -> bool {
        self != MissionType::Hydration
    }

    /// Full reward for the mission; hydration at the daily glass cap.
    pub fn xp_reward(self) -> u32 {
        match self {
            MissionType::Hydration => MAX_GLASSES * XP_PER_GLASS,
            _ => PHOTO_MISSION_XP,
        }
    }
}

impl fmt::Display for MissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MissionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MissionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown mission type: {s}"))
    }
}

/// A completed (or, for hydration, in-progress) mission.
///
/// Stored at: `missions/{user_id}_{date}_{type}`. At most one per user, local
/// day and type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Mission {
    /// Document id
    pub id: String,
    pub user_id: String,
    /// Squad the user belonged to when the mission was first recorded
    pub squad_code: Option<String>,
    #[serde(rename = "type")]
    pub mission_type: MissionType,
    /// Meal/workout photo; absent for hydration
    pub photo_url: Option<String>,
    /// Glasses of water (0..=5); hydration only
    pub water_count: Option<u32>,
    pub xp_earned: u32,
    pub completed_at: DateTime<Utc>,
    /// Local calendar day of the user ("YYYY-MM-DD")
    pub date: String,
}

impl Mission {
    /// Deterministic document id for (user, day, type).
    pub fn document_id(user_id: &str, date: &str, mission_type: MissionType) -> String {
        format!(
            "{}_{}_{}",
            urlencoding::encode(user_id),
            date,
            mission_type.as_str()
        )
    }

    /// True when this record counts toward the daily bonus.
    pub fn counts_as_complete(&self) -> bool {
        match self.mission_type {
            MissionType::Hydration => self.water_count.unwrap_or(0) >= MAX_GLASSES,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mission_type_round_trips_through_str() {
        for t in MissionType::ALL {
            assert_eq!(t.as_str().parse::<MissionType>().unwrap(), t);
        }
        assert!("brunch".parse::<MissionType>().is_err());
    }

    #[test]
    fn test_rewards() {
        assert_eq!(MissionType::Breakfast.xp_reward(), 50);
        assert_eq!(MissionType::Hydration.xp_reward(), 50);
        assert!(!MissionType::Hydration.requires_photo());
        assert!(MissionType::Workout.requires_photo());
    }

    #[test]
    fn test_document_id_escapes_user_id() {
        assert_eq!(
            Mission::document_id("a/b", "2026-10-18", MissionType::Lunch),
            "a%2Fb_2026-10-18_lunch"
        );
    }

    #[test]
    fn test_serialized_type_field() {
        let mission = Mission {
            id: "x".into(),
            user_id: "u1".into(),
            squad_code: None,
            mission_type: MissionType::Snack,
            photo_url: Some("https://img/1.jpg".into()),
            water_count: None,
            xp_earned: 50,
            completed_at: Utc::now(),
            date: "2026-10-18".into(),
        };
        let value = serde_json::to_value(&mission).unwrap();
        assert_eq!(value["type"], "snack");
    }
}
