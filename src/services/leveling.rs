// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Level curve.
//!
//! Advancing from level `n` to `n + 1` costs `n * 500` XP, so reaching level
//! `n` takes `500 * n * (n - 1) / 2` XP in total. Level 1 starts at 0 XP.

use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub const XP_PER_LEVEL_STEP: u64 = 500;

/// XP needed to advance from `level` to `level + 1`.
pub fn xp_required_for_level(level: u32) -> u64 {
    u64::from(level) * XP_PER_LEVEL_STEP
}

/// Cumulative XP needed to be at `level`. Saturates at `u64::MAX`.
pub fn total_xp_to_reach_level(level: u32) -> u64 {
    let n = u128::from(level.max(1));
    let total = u128::from(XP_PER_LEVEL_STEP) * n * (n - 1) / 2;
    u64::try_from(total).unwrap_or(u64::MAX)
}

/// Largest level whose cumulative threshold is at most `xp`.
pub fn level_for_total_xp(xp: u64) -> u32 {
    // Solve 250 n^2 - 250 n <= xp, then correct for float rounding.
    let estimate = ((1.0 + (1.0 + 8.0 * xp as f64 / XP_PER_LEVEL_STEP as f64).sqrt()) / 2.0)
        .floor()
        .max(1.0);
    let mut level = if estimate >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        estimate as u32
    };

    while level > 1 && total_xp_to_reach_level(level) > xp {
        level -= 1;
    }
    while level < u32::MAX && total_xp_to_reach_level(level + 1) <= xp {
        level += 1;
    }
    level
}

/// Position of a user inside their current level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LevelProgress {
    pub level: u32,
    /// XP earned since reaching `level`
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub current: u64,
    /// XP needed to reach the next level
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub required: u64,
    /// `current / required`, in `[0, 1)`
    pub percentage: f64,
}

pub fn progress_in_current_level(xp: u64) -> LevelProgress {
    let level = level_for_total_xp(xp);
    let current = xp - total_xp_to_reach_level(level);
    let required = xp_required_for_level(level);
    let percentage = if required == 0 {
        0.0
    } else {
        (current as f64 / required as f64).clamp(0.0, 1.0 - f64::EPSILON)
    };
    LevelProgress {
        level,
        current,
        required,
        percentage,
    }
}
