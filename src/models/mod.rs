// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod mission;
pub mod ranking;
pub mod squad;
pub mod user;

pub use mission::{Mission, MissionType};
pub use ranking::{RankedUser, RankingEntry, UserPosition, WeeklyRanking, WeeklyWinner};
pub use squad::Squad;
pub use user::{User, XpAward};
