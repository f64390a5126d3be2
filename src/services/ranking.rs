// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Weekly squad rankings.
//!
//! One ranking document per squad and ISO week, with one entry per user that
//! earned XP in that week. `weekly_xp` only ever moves through atomic
//! increments; `today_missions` only through set-union (cleared by the daily
//! reset).

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;

use crate::db::{paths, Db, Precondition, Query, Write};
use crate::error::AppError;
use crate::models::{
    MissionType, RankedUser, RankingEntry, User, UserPosition, WeeklyRanking, WeeklyWinner,
};
use crate::time_utils::Clock;

/// Upper bound on a single ranking page.
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Clone)]
pub struct RankingService {
    db: Db,
    clock: Arc<dyn Clock>,
    page_size: usize,
}

impl RankingService {
    pub fn new(db: Db, clock: Arc<dyn Clock>, page_size: usize) -> Self {
        Self {
            db,
            clock,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Id of the ranking for the ISO week containing now.
    pub fn current_ranking_id(&self, squad_code: &str) -> String {
        WeeklyRanking::for_week(squad_code, self.clock.now()).id
    }

    /// Writes crediting `amount` XP to `user` in the squad's ranking for the
    /// week containing `now`.
    ///
    /// Reads the ranking and entry documents; the returned writes carry the
    /// preconditions for those reads and must be committed in the caller's
    /// transaction.
    pub(crate) async fn xp_writes(
        &self,
        squad_code: &str,
        user: &User,
        amount: u32,
        mission_type: Option<MissionType>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Write>, AppError> {
        let ranking = WeeklyRanking::for_week(squad_code, now);
        let mut writes = Vec::new();

        let ranking_path = paths::ranking(&ranking.id);
        if !self.db.get_doc(&ranking_path).await?.exists() {
            writes.push(Write::set(ranking_path, &ranking)?.when(Precondition::Missing));
        }

        let entry_path = paths::ranking_entry(&ranking.id, &user.id);
        if self.db.get_doc(&entry_path).await?.exists() {
            writes.push(
                Write::increment(entry_path.clone(), "weekly_xp", i64::from(amount))
                    .when(Precondition::Exists),
            );
            if let Some(mission_type) = mission_type {
                writes.push(Write::array_union(
                    entry_path.clone(),
                    "today_missions",
                    vec![json!(mission_type.as_str())],
                ));
            }
            writes.push(Write::merge(entry_path, json!({ "last_updated": now })));
        } else {
            let entry = RankingEntry {
                user_id: user.id.clone(),
                name: user.name.clone(),
                avatar_url: user.avatar_url.clone(),
                weekly_xp: u64::from(amount),
                today_missions: mission_type.into_iter().collect(),
                last_updated: now,
            };
            writes.push(Write::set(entry_path, &entry)?.when(Precondition::Missing));
        }

        Ok(writes)
    }

    /// Credit XP to a user's entry in the current week's ranking.
    ///
    /// Creates the week's ranking and the user's entry on first contribution.
    pub async fn record_xp(
        &self,
        user_id: &str,
        squad_code: &str,
        amount: u32,
        mission_type: Option<MissionType>,
    ) -> Result<RankingEntry, AppError> {
        let now = self.clock.now();
        let ranking_id = WeeklyRanking::for_week(squad_code, now).id;

        self.db
            .run_transaction("record_xp", || async move {
                let user = self
                    .db
                    .get_user(user_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))?;
                let writes = self
                    .xp_writes(squad_code, &user, amount, mission_type, now)
                    .await?;
                self.db.commit(writes).await
            })
            .await?;

        tracing::debug!(
            user_id,
            squad_code,
            ranking_id = %ranking_id,
            amount,
            "Recorded ranking XP"
        );

        self.db
            .get_ranking_entry(&ranking_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Ranking entry for {user_id}")))
    }

    /// Current week's leaderboard, best first. Ties keep document order.
    pub async fn get_ranking(
        &self,
        squad_code: &str,
        current_user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<RankedUser>, AppError> {
        let limit = limit.unwrap_or(self.page_size).clamp(1, MAX_PAGE_SIZE);
        let ranking_id = self.current_ranking_id(squad_code);

        let entries = self
            .db
            .get_ranking_entries(&ranking_id, Some(limit))
            .await?;

        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| RankedUser {
                position: u32::try_from(i + 1).unwrap_or(u32::MAX),
                is_current_user: entry.user_id == current_user_id,
                user_id: entry.user_id,
                name: entry.name,
                avatar_url: entry.avatar_url,
                weekly_xp: entry.weekly_xp,
                today_missions: entry.today_missions,
            })
            .collect())
    }

    /// 1 + number of entries with strictly more XP; `None` without an entry.
    pub async fn get_user_position(
        &self,
        squad_code: &str,
        user_id: &str,
    ) -> Result<Option<UserPosition>, AppError> {
        let ranking_id = self.current_ranking_id(squad_code);

        let Some(entry) = self.db.get_ranking_entry(&ranking_id, user_id).await? else {
            return Ok(None);
        };

        let above = self
            .db
            .count_ranking_entries_above(&ranking_id, entry.weekly_xp)
            .await?;
        let total = self.db.count_ranking_entries(&ranking_id).await?;

        Ok(Some(UserPosition {
            position: u32::try_from(above + 1).unwrap_or(u32::MAX),
            total_users: u32::try_from(total).unwrap_or(u32::MAX),
            weekly_xp: entry.weekly_xp,
        }))
    }

    /// Clear `today_missions` on every entry of the squad's current ranking.
    ///
    /// Returns the number of entries that were cleared.
    pub async fn reset_today_missions(&self, squad_code: &str) -> Result<usize, AppError> {
        let ranking_id = self.current_ranking_id(squad_code);

        let stale: Vec<Write> = self
            .db
            .store()
            .query(&Query::collection(paths::ranking_entries(&ranking_id)))
            .await?
            .into_iter()
            .filter(|snap| {
                snap.data
                    .as_ref()
                    .and_then(|d| d.get("today_missions"))
                    .and_then(|v| v.as_array())
                    .is_some_and(|missions| !missions.is_empty())
            })
            .map(|snap| {
                Write::merge(snap.path, json!({ "today_missions": [] }))
                    .when(Precondition::Exists)
            })
            .collect();

        let count = stale.len();
        // Each entry is cleared on its own so a concurrently deleted entry
        // only drops that one write.
        for write in stale {
            match self.db.commit(vec![write]).await {
                Ok(()) | Err(AppError::Contention(_)) => {}
                Err(e) => return Err(e),
            }
        }

        tracing::debug!(squad_code, ranking_id = %ranking_id, count, "Reset today's missions");
        Ok(count)
    }

    /// Create the ranking for the ISO week containing `at` if it is absent.
    ///
    /// Returns true when this call created it.
    pub async fn open_week(&self, squad_code: &str, at: DateTime<Utc>) -> Result<bool, AppError> {
        let ranking = WeeklyRanking::for_week(squad_code, at);
        let write = Write::set(paths::ranking(&ranking.id), &ranking)?.when(Precondition::Missing);
        match self.db.commit(vec![write]).await {
            Ok(()) => Ok(true),
            Err(AppError::Contention(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Mark the ranking of the week containing `at` as closed.
    ///
    /// Returns true only for the call that closed it, so a week is closed
    /// once however many times the rollover runs.
    pub async fn close_week(&self, squad_code: &str, at: DateTime<Utc>) -> Result<bool, AppError> {
        let now = self.clock.now();
        let ranking = &WeeklyRanking::for_week(squad_code, at);
        let path = &paths::ranking(&ranking.id);

        self.db
            .run_transaction("close_week", || async move {
                let snap = self.db.get_doc(path).await?;
                let write = match snap.decode::<WeeklyRanking>()? {
                    Some(stored) if stored.closed_at.is_some() => return Ok(false),
                    Some(_) => Write::merge(path.clone(), json!({ "closed_at": now }))
                        .when(snap.unchanged()),
                    None => {
                        let mut closed = ranking.clone();
                        closed.closed_at = Some(now);
                        Write::set(path.clone(), &closed)?.when(Precondition::Missing)
                    }
                };
                self.db.commit(vec![write]).await?;
                Ok(true)
            })
            .await
    }

    /// Top entry of the week containing `at`; first maximum wins ties.
    pub async fn week_winner(
        &self,
        squad_code: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<WeeklyWinner>, AppError> {
        let ranking = WeeklyRanking::for_week(squad_code, at);
        let entries = self.db.get_ranking_entries(&ranking.id, Some(1)).await?;

        Ok(entries.into_iter().next().map(|entry| WeeklyWinner {
            squad_code: squad_code.to_string(),
            week_id: ranking.week_id,
            user_id: entry.user_id,
            name: entry.name,
            weekly_xp: entry.weekly_xp,
        }))
    }
}
