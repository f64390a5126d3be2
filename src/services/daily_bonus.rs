// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily completion bonus.

use chrono::NaiveDate;
use std::collections::HashSet;

use crate::models::{Mission, MissionType};

pub const DAILY_BONUS_XP: u32 = 100;

/// Types that count as done; hydration only once the glass goal is reached.
pub fn completed_types<'a>(missions: impl IntoIterator<Item = &'a Mission>) -> HashSet<MissionType> {
    missions
        .into_iter()
        .filter(|m| m.counts_as_complete())
        .map(|m| m.mission_type)
        .collect()
}

pub fn is_eligible_for_daily_bonus(completed: &HashSet<MissionType>) -> bool {
    MissionType::ALL.iter().all(|t| completed.contains(t))
}

/// Eligible and not yet granted for `today`.
pub fn should_award(
    completed: &HashSet<MissionType>,
    bonus_awarded_date: Option<NaiveDate>,
    today: NaiveDate,
) -> bool {
    bonus_awarded_date != Some(today) && is_eligible_for_daily_bonus(completed)
}
