// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Consecutive-day streaks, evaluated in the user's local calendar.

use chrono::NaiveDate;

/// True iff `last` is exactly the day before `today`.
pub fn should_increment(last: Option<NaiveDate>, today: NaiveDate) -> bool {
    last.and_then(|d| d.succ_opt()) == Some(today)
}

pub fn is_already_counted_today(last: Option<NaiveDate>, today: NaiveDate) -> bool {
    last == Some(today)
}

pub fn resulting_streak(current: u32, last: Option<NaiveDate>, today: NaiveDate) -> u32 {
    if is_already_counted_today(last, today) {
        current
    } else if should_increment(last, today) {
        current.saturating_add(1)
    } else {
        1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    pub current: u32,
    pub longest: u32,
    pub last_completed: NaiveDate,
}

/// Streak state after an XP-earning event on `today`.
pub fn apply(current: u32, longest: u32, last: Option<NaiveDate>, today: NaiveDate) -> StreakUpdate {
    let current = resulting_streak(current, last, today);
    StreakUpdate {
        current,
        longest: longest.max(current),
        last_completed: today,
    }
}
