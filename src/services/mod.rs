// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod daily_bonus;
pub mod jobs;
pub mod leveling;
pub mod missions;
pub mod notifications;
pub mod ranking;
pub mod scheduler;
pub mod squads;
pub mod streak;
pub mod users;

pub use jobs::{JobReport, ScheduledJobs};
pub use missions::{MissionLedger, MissionOutcome};
pub use notifications::{
    HttpPushDispatcher, LogDispatcher, Notification, Notifier, NotifyError, PushDispatcher,
    PushMessage,
};
pub use ranking::RankingService;
pub use scheduler::{due_jobs, Job};
pub use squads::{CodeGenerator, RandomCodeGenerator, SquadRegistry};
pub use users::{NewProfile, ProfileView, SettingsUpdate, UserService};
