// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process trigger for scheduled jobs.
//!
//! Calendar triggers (UTC):
//! - every :00 and :30, reminders
//! - every day at 00:00, daily reset
//! - Monday 00:00, weekly rollover (before the daily reset)

use chrono::{DateTime, Datelike, Duration, DurationRound, Timelike, Utc, Weekday};
use serde::Serialize;
use std::sync::Arc;

use crate::services::jobs::{JobReport, ScheduledJobs};
use crate::time_utils::Clock;

/// Missed minutes considered after a stall.
const MAX_CATCH_UP_MINUTES: i64 = 2 * 24 * 60;
const TICK: std::time::Duration = std::time::Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Job {
    WeeklyRollover,
    DailyReset,
    Reminders,
}

fn jobs_at(minute: DateTime<Utc>) -> impl Iterator<Item = Job> {
    let midnight = minute.hour() == 0 && minute.minute() == 0;
    [
        (midnight && minute.weekday() == Weekday::Mon).then_some(Job::WeeklyRollover),
        midnight.then_some(Job::DailyReset),
        (minute.minute() % 30 == 0).then_some(Job::Reminders),
    ]
    .into_iter()
    .flatten()
}

/// Jobs whose trigger minute falls in `(previous, now]`, each at most once,
/// in execution order.
pub fn due_jobs(previous: DateTime<Utc>, now: DateTime<Utc>) -> Vec<Job> {
    let mut due = Vec::new();
    if now <= previous {
        return due;
    }

    let (Ok(previous), Ok(now_minute)) = (
        previous.duration_trunc(Duration::minutes(1)),
        now.duration_trunc(Duration::minutes(1)),
    ) else {
        return due;
    };

    let earliest = now_minute - Duration::minutes(MAX_CATCH_UP_MINUTES);
    let mut minute = (previous + Duration::minutes(1)).max(earliest);
    while minute <= now_minute {
        for job in jobs_at(minute) {
            if !due.contains(&job) {
                due.push(job);
            }
        }
        minute += Duration::minutes(1);
    }

    due.sort_by_key(|job| match job {
        Job::WeeklyRollover => 0,
        Job::DailyReset => 1,
        Job::Reminders => 2,
    });
    due
}

impl ScheduledJobs {
    pub async fn run(&self, job: Job) -> JobReport {
        match job {
            Job::WeeklyRollover => self.weekly_rollover().await,
            Job::DailyReset => self.daily_reset().await,
            Job::Reminders => self.send_reminders().await,
        }
    }
}

/// Evaluate due jobs once a minute, forever.
pub async fn run_scheduler(jobs: ScheduledJobs, clock: Arc<dyn Clock>) {
    let mut interval = tokio::time::interval(TICK);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    let mut previous = clock.now();
    tracing::info!("Internal scheduler started");

    loop {
        interval.tick().await;
        let now = clock.now();
        for job in due_jobs(previous, now) {
            tracing::debug!(?job, "Running scheduled job");
            let report = jobs.run(job).await;
            if !report.failed.is_empty() {
                tracing::warn!(?job, failed = report.failed.len(), "Scheduled job had failures");
            }
        }
        previous = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_nothing_due_mid_half_hour() {
        assert!(due_jobs(utc(2026, 10, 14, 10, 5, 0), utc(2026, 10, 14, 10, 6, 0)).is_empty());
    }

    #[test]
    fn test_reminders_on_half_hours() {
        assert_eq!(
            due_jobs(utc(2026, 10, 14, 10, 29, 30), utc(2026, 10, 14, 10, 30, 10)),
            vec![Job::Reminders]
        );
        assert_eq!(
            due_jobs(utc(2026, 10, 14, 10, 59, 59), utc(2026, 10, 14, 11, 0, 0)),
            vec![Job::Reminders]
        );
    }

    #[test]
    fn test_boundary_minute_not_repeated() {
        // previous tick already covered 10:30
        assert!(due_jobs(utc(2026, 10, 14, 10, 30, 5), utc(2026, 10, 14, 10, 31, 5)).is_empty());
    }

    #[test]
    fn test_midnight_runs_daily_reset() {
        assert_eq!(
            due_jobs(utc(2026, 10, 14, 23, 59, 30), utc(2026, 10, 15, 0, 0, 30)),
            vec![Job::DailyReset, Job::Reminders]
        );
    }

    #[test]
    fn test_monday_midnight_runs_rollover_first() {
        // 2026-10-19 is a Monday
        assert_eq!(
            due_jobs(utc(2026, 10, 18, 23, 59, 10), utc(2026, 10, 19, 0, 0, 10)),
            vec![Job::WeeklyRollover, Job::DailyReset, Job::Reminders]
        );
    }

    #[test]
    fn test_catch_up_after_stall() {
        let due = due_jobs(utc(2026, 10, 18, 20, 0, 0), utc(2026, 10, 19, 8, 0, 0));
        assert_eq!(due, vec![Job::WeeklyRollover, Job::DailyReset, Job::Reminders]);
    }

    #[test]
    fn test_clock_going_backwards() {
        assert!(due_jobs(utc(2026, 10, 14, 10, 0, 0), utc(2026, 10, 14, 9, 0, 0)).is_empty());
    }
}
