// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mission ledger.
//!
//! Every XP-earning action commits as one transaction:
//! - the mission document (deterministic id per user, day and type)
//! - the user's XP, cached level, streak and daily-bonus marker
//! - the squad ranking entry for the current week
//!
//! The user document is written with a version precondition and the mission
//! document with a create-or-unchanged precondition, so concurrent requests
//! for the same user serialize through retries instead of double counting.

use chrono::{DateTime, NaiveDate, Utc};
use futures_util::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::db::{paths, Db, Precondition, Snapshot, Write};
use crate::error::AppError;
use crate::models::mission::{MAX_GLASSES, XP_PER_GLASS};
use crate::models::{Mission, MissionType, User};
use crate::services::daily_bonus::{self, DAILY_BONUS_XP};
use crate::services::notifications::Notifier;
use crate::services::ranking::RankingService;
use crate::time_utils::{format_date, Clock};

/// Result of a mission mutation, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MissionOutcome {
    pub mission: Mission,
    /// XP granted by this call for the mission itself
    pub xp_awarded: u32,
    /// Daily bonus granted by this call (0 or 100)
    pub bonus_xp: u32,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_xp: u64,
    pub level: u32,
    pub leveled_up: bool,
    pub current_streak: u32,
}

/// The six mission slots of one user and local day, as read.
struct DayMissions {
    date: String,
    /// Indexed by `MissionType as usize`
    slots: Vec<Snapshot>,
}

impl DayMissions {
    async fn load(db: &Db, user_id: &str, day: NaiveDate) -> Result<Self, AppError> {
        let date = format_date(day);
        let reads = MissionType::ALL.map(|mission_type| {
            let path = paths::mission(user_id, &date, mission_type);
            async move { db.get_doc(&path).await }
        });
        let slots = try_join_all(reads).await?;
        Ok(Self { date, slots })
    }

    fn slot(&self, mission_type: MissionType) -> &Snapshot {
        &self.slots[mission_type as usize]
    }

    /// Recorded missions other than `except`.
    fn others(&self, except: MissionType) -> Result<Vec<Mission>, AppError> {
        let mut missions = Vec::new();
        for (mission_type, snap) in MissionType::ALL.iter().zip(&self.slots) {
            if *mission_type == except {
                continue;
            }
            if let Some(mission) = snap.decode()? {
                missions.push(mission);
            }
        }
        Ok(missions)
    }

    fn all(&self) -> Result<Vec<Mission>, AppError> {
        let mut missions = Vec::new();
        for snap in &self.slots {
            if let Some(mission) = snap.decode::<Mission>()? {
                missions.push(mission);
            }
        }
        Ok(missions)
    }
}

/// What a committed transaction hands back for post-commit side effects.
struct Committed {
    outcome: MissionOutcome,
    user: User,
}

#[derive(Clone)]
pub struct MissionLedger {
    db: Db,
    clock: Arc<dyn Clock>,
    ranking: RankingService,
    notifier: Notifier,
}

impl MissionLedger {
    pub fn new(db: Db, clock: Arc<dyn Clock>, ranking: RankingService, notifier: Notifier) -> Self {
        Self {
            db,
            clock,
            ranking,
            notifier,
        }
    }

    /// Record a photo mission for the user's current local day.
    pub async fn complete_mission(
        &self,
        user_id: &str,
        mission_type: MissionType,
        photo_url: &str,
    ) -> Result<MissionOutcome, AppError> {
        if !mission_type.requires_photo() {
            return Err(AppError::PhotoNotRequired);
        }
        let photo_url = photo_url.trim();
        if photo_url.is_empty() {
            return Err(AppError::BadRequest("photo_url is required".to_string()));
        }

        let now = self.clock.now();
        let committed = self
            .db
            .run_transaction("complete_mission", || async move {
                self.try_complete_mission(user_id, mission_type, photo_url, now)
                    .await
            })
            .await?;

        tracing::info!(
            user_id,
            mission_type = %mission_type,
            xp = committed.outcome.xp_awarded,
            bonus = committed.outcome.bonus_xp,
            "Mission completed"
        );

        self.after_commit(&committed).await;
        Ok(committed.outcome)
    }

    async fn try_complete_mission(
        &self,
        user_id: &str,
        mission_type: MissionType,
        photo_url: &str,
        now: DateTime<Utc>,
    ) -> Result<Committed, AppError> {
        let user_snap = self.db.get_doc(&paths::user(user_id)).await?;
        let user: User = user_snap
            .decode()?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))?;

        let day = DayMissions::load(&self.db, user_id, user.today(now)).await?;
        let slot = day.slot(mission_type);
        if slot.exists() {
            return Err(AppError::AlreadyCompleted);
        }

        let mission = Mission {
            id: slot.path.id.clone(),
            user_id: user_id.to_string(),
            squad_code: user.squad_code.clone(),
            mission_type,
            photo_url: Some(photo_url.to_string()),
            water_count: None,
            xp_earned: mission_type.xp_reward(),
            completed_at: now,
            date: day.date.clone(),
        };
        let mission_write = Write::set(slot.path.clone(), &mission)?.when(Precondition::Missing);
        let xp = mission.xp_earned;

        self.commit_award(&user_snap, user, &day, mission, mission_write, xp, now)
            .await
    }

    /// Set today's glass count (clamped to 0..=5).
    ///
    /// Only increases over the stored count earn XP. Lowering the count is
    /// accepted and rewrites the record's `xp_earned`, but XP already granted
    /// stays granted.
    ///
    /// The delta is taken against the stored count, not the day's high-water
    /// mark, so going 5 -> 3 -> 5 pays the last two glasses again. The count
    /// is capped; the XP earned by toggling is not.
    pub async fn update_hydration(
        &self,
        user_id: &str,
        glasses: i64,
    ) -> Result<MissionOutcome, AppError> {
        let glasses = u32::try_from(glasses.clamp(0, i64::from(MAX_GLASSES))).unwrap_or(0);

        let now = self.clock.now();
        let committed = self
            .db
            .run_transaction("update_hydration", || async move {
                self.try_update_hydration(user_id, glasses, now).await
            })
            .await?;

        tracing::info!(
            user_id,
            glasses,
            xp = committed.outcome.xp_awarded,
            bonus = committed.outcome.bonus_xp,
            "Hydration updated"
        );

        self.after_commit(&committed).await;
        Ok(committed.outcome)
    }

    async fn try_update_hydration(
        &self,
        user_id: &str,
        glasses: u32,
        now: DateTime<Utc>,
    ) -> Result<Committed, AppError> {
        let user_snap = self.db.get_doc(&paths::user(user_id)).await?;
        let user: User = user_snap
            .decode()?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))?;

        let day = DayMissions::load(&self.db, user_id, user.today(now)).await?;
        let slot = day.slot(MissionType::Hydration);
        let existing: Option<Mission> = slot.decode()?;

        let previous = existing
            .as_ref()
            .and_then(|m| m.water_count)
            .unwrap_or(0);
        let xp_delta = glasses.saturating_sub(previous) * XP_PER_GLASS;

        let mission = match existing {
            Some(mission) => Mission {
                water_count: Some(glasses),
                xp_earned: glasses * XP_PER_GLASS,
                completed_at: now,
                ..mission
            },
            None => Mission {
                id: slot.path.id.clone(),
                user_id: user_id.to_string(),
                squad_code: user.squad_code.clone(),
                mission_type: MissionType::Hydration,
                photo_url: None,
                water_count: Some(glasses),
                xp_earned: glasses * XP_PER_GLASS,
                completed_at: now,
                date: day.date.clone(),
            },
        };
        let mission_write = Write::set(slot.path.clone(), &mission)?.when(slot.unchanged());

        self.commit_award(&user_snap, user, &day, mission, mission_write, xp_delta, now)
            .await
    }

    /// Apply XP, streak and daily bonus to `user` and commit everything with
    /// the mission write and the ranking update.
    #[allow(clippy::too_many_arguments)]
    async fn commit_award(
        &self,
        user_snap: &Snapshot,
        mut user: User,
        day: &DayMissions,
        mission: Mission,
        mission_write: Write,
        xp: u32,
        now: DateTime<Utc>,
    ) -> Result<Committed, AppError> {
        let today = user.today(now);
        let previous_level = user.level;

        if xp > 0 {
            user.award_xp(xp, today);
        }

        let mut missions = day.others(mission.mission_type)?;
        missions.push(mission.clone());
        let completed = daily_bonus::completed_types(&missions);

        let bonus_xp = if daily_bonus::should_award(&completed, user.bonus_awarded_date, today) {
            user.award_xp(DAILY_BONUS_XP, today);
            user.bonus_awarded_date = Some(today);
            DAILY_BONUS_XP
        } else {
            0
        };

        let mut writes = vec![
            mission_write,
            Write::set(user_snap.path.clone(), &user)?.when(user_snap.unchanged()),
        ];

        let ranking_xp = xp + bonus_xp;
        if let Some(squad_code) = user.squad_code.as_deref() {
            if ranking_xp > 0 {
                let mission_type = (xp > 0).then_some(mission.mission_type);
                writes.extend(
                    self.ranking
                        .xp_writes(squad_code, &user, ranking_xp, mission_type, now)
                        .await?,
                );
            }
        }

        self.db.commit(writes).await?;

        Ok(Committed {
            outcome: MissionOutcome {
                mission,
                xp_awarded: xp,
                bonus_xp,
                total_xp: user.total_xp,
                level: user.level,
                leveled_up: user.level > previous_level,
                current_streak: user.current_streak,
            },
            user,
        })
    }

    async fn after_commit(&self, committed: &Committed) {
        let outcome = &committed.outcome;
        if outcome.leveled_up {
            tracing::info!(user_id = %committed.user.id, level = outcome.level, "Level up");
            self.notifier.level_up(&committed.user, outcome.level).await;
        }
        if outcome.bonus_xp > 0 {
            tracing::info!(user_id = %committed.user.id, "Daily bonus awarded");
            self.notifier
                .daily_bonus(&committed.user, outcome.bonus_xp)
                .await;
        }
    }

    /// Missions recorded for the user's current local day.
    pub async fn get_today_missions(&self, user_id: &str) -> Result<Vec<Mission>, AppError> {
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))?;
        let day = DayMissions::load(&self.db, user_id, user.today(self.clock.now())).await?;
        day.all()
    }
}
