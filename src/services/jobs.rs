// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Time-triggered jobs: weekly ranking rollover, daily reset and reminders.
//!
//! Jobs fan out per squad or per user with bounded concurrency. A failure on
//! one squad or user is logged and reported; it never stops the others.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use dashmap::DashMap;
use futures_util::{stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;

use crate::db::Db;
use crate::error::AppError;
use crate::models::{Mission, MissionType, User, WeeklyWinner};
use crate::services::daily_bonus::completed_types;
use crate::services::notifications::{Notification, Notifier};
use crate::services::ranking::RankingService;
use crate::services::streak;
use crate::time_utils::{format_date, iso_week_bounds, Clock};

const MAX_CONCURRENT_SQUADS: usize = 16;
const MAX_CONCURRENT_USERS: usize = 32;
/// Streak length worth warning about.
const STREAK_WARNING_MIN: u32 = 3;

/// Outcome of one job run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobReport {
    pub job: &'static str,
    /// Squads or users handled successfully
    pub processed: usize,
    /// Ids of squads or users that failed
    pub failed: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub winners: Vec<WeeklyWinner>,
    pub notifications_sent: usize,
}

impl JobReport {
    fn new(job: &'static str) -> Self {
        Self {
            job,
            ..Default::default()
        }
    }
}

/// Local-time reminder slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReminderKind {
    Breakfast,
    Lunch,
    Dinner,
    DailySummary,
    StreakWarning,
}

impl ReminderKind {
    /// Slot starting in the half hour containing `local`.
    pub fn due_at(local: NaiveTime) -> Option<Self> {
        match (local.hour(), local.minute() / 30) {
            (9, 0) => Some(ReminderKind::Breakfast),
            (13, 0) => Some(ReminderKind::Lunch),
            (19, 0) => Some(ReminderKind::Dinner),
            (21, 0) => Some(ReminderKind::DailySummary),
            (21, 1) => Some(ReminderKind::StreakWarning),
            _ => None,
        }
    }

    /// The notification this slot produces for a user, if any.
    pub fn notification(
        self,
        user: &User,
        today: NaiveDate,
        missions_today: &[Mission],
    ) -> Option<Notification> {
        let meal = |mission_type: MissionType| {
            (!missions_today.iter().any(|m| m.mission_type == mission_type))
                .then_some(Notification::MissionReminder { mission_type })
        };

        match self {
            ReminderKind::Breakfast => meal(MissionType::Breakfast),
            ReminderKind::Lunch => meal(MissionType::Lunch),
            ReminderKind::Dinner => meal(MissionType::Dinner),
            ReminderKind::DailySummary => {
                let total = MissionType::ALL.len();
                let completed = completed_types(missions_today).len();
                (completed < total).then_some(Notification::DailySummary { completed, total })
            }
            ReminderKind::StreakWarning => {
                // Only a streak still alive from yesterday is at risk.
                let at_risk = user.current_streak >= STREAK_WARNING_MIN
                    && missions_today.is_empty()
                    && streak::should_increment(user.last_completed_date, today);
                at_risk.then_some(Notification::StreakWarning {
                    streak: user.current_streak,
                })
            }
        }
    }
}

#[derive(Clone)]
pub struct ScheduledJobs {
    db: Db,
    clock: Arc<dyn Clock>,
    ranking: RankingService,
    notifier: Notifier,
    /// (user, slot) -> local day the reminder went out
    sent_reminders: Arc<DashMap<(String, ReminderKind), NaiveDate>>,
}

impl ScheduledJobs {
    pub fn new(db: Db, clock: Arc<dyn Clock>, ranking: RankingService, notifier: Notifier) -> Self {
        Self {
            db,
            clock,
            ranking,
            notifier,
            sent_reminders: Arc::new(DashMap::new()),
        }
    }

    // ─── Weekly Rollover ───────────────────────────────────────────

    /// Close the ISO week that contained `now - 12h` and open the next one.
    ///
    /// The 12 hour lookback lets a trigger that fires a little after Monday
    /// 00:00 still close the week that just ended.
    pub async fn weekly_rollover(&self) -> JobReport {
        let closing_at = self.clock.now() - Duration::hours(12);
        let (_, week_end) = iso_week_bounds(closing_at);
        let next_week = week_end + Duration::seconds(1);

        let mut report = JobReport::new("weekly_rollover");
        let squads = match self.db.get_all_squads().await {
            Ok(squads) => squads,
            Err(e) => {
                tracing::error!(error = %e, "Weekly rollover could not list squads");
                report.failed.push("*".to_string());
                return report;
            }
        };

        let results: Vec<(String, Result<(Option<WeeklyWinner>, bool), AppError>)> =
            stream::iter(squads)
                .map(|squad| async move {
                    let result = self.rollover_squad(&squad.code, closing_at, next_week).await;
                    (squad.code, result)
                })
                .buffer_unordered(MAX_CONCURRENT_SQUADS)
                .collect()
                .await;

        for (code, result) in results {
            match result {
                Ok((winner, notified)) => {
                    report.processed += 1;
                    report.notifications_sent += usize::from(notified);
                    report.winners.extend(winner);
                }
                Err(e) => {
                    tracing::error!(squad_code = %code, error = %e, "Weekly rollover failed for squad");
                    report.failed.push(code);
                }
            }
        }

        report.failed.sort();
        report.winners.sort_by(|a, b| a.squad_code.cmp(&b.squad_code));
        tracing::info!(
            processed = report.processed,
            failed = report.failed.len(),
            winners = report.winners.len(),
            "Weekly rollover complete"
        );
        report
    }

    async fn rollover_squad(
        &self,
        squad_code: &str,
        closing_at: DateTime<Utc>,
        next_week: DateTime<Utc>,
    ) -> Result<(Option<WeeklyWinner>, bool), AppError> {
        let winner = self.ranking.week_winner(squad_code, closing_at).await?;
        let winner_user = match &winner {
            Some(winner) => self.db.get_user(&winner.user_id).await?,
            None => None,
        };

        // Only the run that closes the week announces its winner.
        let closed_now = self.ranking.close_week(squad_code, closing_at).await?;

        let mut notified = false;
        if let Some(winner) = &winner {
            tracing::info!(
                squad_code,
                week_id = %winner.week_id,
                user_id = %winner.user_id,
                weekly_xp = winner.weekly_xp,
                closed_now,
                "Weekly winner"
            );
            if let (true, Some(user)) = (closed_now, &winner_user) {
                notified = self.notifier.weekly_winner(user, winner).await;
            }
        }

        self.ranking.open_week(squad_code, next_week).await?;
        Ok((winner, notified))
    }

    // ─── Daily Reset ───────────────────────────────────────────────

    /// Clear today's mission markers on every squad's current ranking.
    pub async fn daily_reset(&self) -> JobReport {
        let mut report = JobReport::new("daily_reset");
        let squads = match self.db.get_all_squads().await {
            Ok(squads) => squads,
            Err(e) => {
                tracing::error!(error = %e, "Daily reset could not list squads");
                report.failed.push("*".to_string());
                return report;
            }
        };

        let results: Vec<(String, Result<usize, AppError>)> = stream::iter(squads)
            .map(|squad| async move {
                let result = self.ranking.reset_today_missions(&squad.code).await;
                (squad.code, result)
            })
            .buffer_unordered(MAX_CONCURRENT_SQUADS)
            .collect()
            .await;

        for (code, result) in results {
            match result {
                Ok(_) => report.processed += 1,
                Err(e) => {
                    tracing::error!(squad_code = %code, error = %e, "Daily reset failed for squad");
                    report.failed.push(code);
                }
            }
        }

        report.failed.sort();
        tracing::info!(
            processed = report.processed,
            failed = report.failed.len(),
            "Daily reset complete"
        );
        report
    }

    // ─── Reminders ─────────────────────────────────────────────────

    /// Send whichever reminder is due at each user's local time.
    ///
    /// A (user, slot) pair is sent at most once per local day, so running
    /// this more than once in the same half hour is harmless.
    pub async fn send_reminders(&self) -> JobReport {
        let now = self.clock.now();
        let mut report = JobReport::new("reminders");

        let horizon = now.date_naive() - Duration::days(2);
        self.sent_reminders.retain(|_, day| *day >= horizon);

        let users = match self.db.get_notifiable_users().await {
            Ok(users) => users,
            Err(e) => {
                tracing::error!(error = %e, "Reminders could not list users");
                report.failed.push("*".to_string());
                return report;
            }
        };

        let results: Vec<(String, Result<bool, AppError>)> = stream::iter(users)
            .filter(|user| std::future::ready(user.can_receive_push()))
            .map(|user| async move {
                let result = self.remind_user(&user, now).await;
                (user.id, result)
            })
            .buffer_unordered(MAX_CONCURRENT_USERS)
            .collect()
            .await;

        for (user_id, result) in results {
            match result {
                Ok(sent) => {
                    report.processed += 1;
                    report.notifications_sent += usize::from(sent);
                }
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "Reminder failed for user");
                    report.failed.push(user_id);
                }
            }
        }

        report.failed.sort();
        tracing::info!(
            processed = report.processed,
            sent = report.notifications_sent,
            failed = report.failed.len(),
            "Reminders complete"
        );
        report
    }

    async fn remind_user(&self, user: &User, now: DateTime<Utc>) -> Result<bool, AppError> {
        let local = now + Duration::minutes(i64::from(user.utc_offset_minutes));
        let Some(kind) = ReminderKind::due_at(local.time()) else {
            return Ok(false);
        };
        let today = user.today(now);

        let key = (user.id.clone(), kind);
        if self.sent_reminders.get(&key).is_some_and(|day| *day == today) {
            return Ok(false);
        }

        let missions = self
            .db
            .get_missions_for_day(&user.id, &format_date(today))
            .await?;
        let Some(notification) = kind.notification(user, today, &missions) else {
            return Ok(false);
        };

        let sent = self.notifier.notify(user, &notification).await;
        if sent {
            self.sent_reminders.insert(key, today);
        }
        Ok(sent)
    }
}
