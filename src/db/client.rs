// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed access to the document store.
//!
//! Provides high-level operations for:
//! - Users (profiles and progression)
//! - Squads (membership and invite codes)
//! - Missions (one document per user, local day and type)
//! - Weekly rankings and their entries
//!
//! plus [`Db::run_transaction`], the optimistic retry loop every
//! read-modify-write in the game goes through.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::db::memory::MemoryStore;
use crate::db::store::{Direction, DocPath, DocumentStore, Precondition, Query, Snapshot, Write};
use crate::db::{collections, paths};
use crate::error::AppError;
use crate::models::{Mission, RankingEntry, Squad, User, WeeklyRanking};

// Bound on writes per commit, mirroring common document-store limits.
const BATCH_SIZE: usize = 400;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Bounded exponential backoff for write conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(MAX_RETRY_DELAY)
    }
}

/// Document store client.
#[derive(Clone)]
pub struct Db {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
}

impl Db {
    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// In-memory client for tests (offline mode).
    pub fn new_mock() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            RetryPolicy {
                max_attempts: 5,
                base_delay: Duration::from_millis(1),
            },
        )
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    // ─── Transactions ──────────────────────────────────────────────

    /// Run a read-modify-write body until it commits.
    ///
    /// The body must do all of its reads and end with a single commit whose
    /// preconditions cover what it read. On a write conflict the whole body is
    /// re-run against fresh data; after `max_attempts` the conflict surfaces
    /// as [`AppError::Contention`].
    pub async fn run_transaction<T, F, Fut>(&self, name: &str, mut body: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 1;
        loop {
            match body().await {
                Err(AppError::Contention(path)) if attempt < self.retry.max_attempts => {
                    tracing::debug!(
                        transaction = name,
                        attempt,
                        path = %path,
                        "Write conflict, retrying transaction"
                    );
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(AppError::Contention(path)) => {
                    tracing::warn!(
                        transaction = name,
                        attempts = attempt,
                        path = %path,
                        "Transaction gave up after repeated conflicts"
                    );
                    return Err(AppError::Contention(path));
                }
                other => return other,
            }
        }
    }

    pub async fn commit(&self, writes: Vec<Write>) -> Result<(), AppError> {
        if writes.is_empty() {
            return Ok(());
        }
        Ok(self.store.commit(writes).await?)
    }

    // ─── Reads ─────────────────────────────────────────────────────

    pub async fn get_doc(&self, path: &DocPath) -> Result<Snapshot, AppError> {
        Ok(self.store.get(path).await?)
    }

    async fn get_typed<T: DeserializeOwned>(&self, path: &DocPath) -> Result<Option<T>, AppError> {
        Ok(self.get_doc(path).await?.decode()?)
    }

    async fn query_typed<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>, AppError> {
        let snapshots = self.store.query(query).await?;
        let mut out = Vec::with_capacity(snapshots.len());
        for snap in &snapshots {
            if let Some(doc) = snap.decode()? {
                out.push(doc);
            }
        }
        Ok(out)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_typed(&paths::user(user_id)).await
    }

    pub async fn get_squad(&self, code: &str) -> Result<Option<Squad>, AppError> {
        self.get_typed(&paths::squad(code)).await
    }

    pub async fn get_ranking(&self, ranking_id: &str) -> Result<Option<WeeklyRanking>, AppError> {
        self.get_typed(&paths::ranking(ranking_id)).await
    }

    pub async fn get_ranking_entry(
        &self,
        ranking_id: &str,
        user_id: &str,
    ) -> Result<Option<RankingEntry>, AppError> {
        self.get_typed(&paths::ranking_entry(ranking_id, user_id))
            .await
    }

    /// All squads, in code order.
    pub async fn get_all_squads(&self) -> Result<Vec<Squad>, AppError> {
        self.query_typed(&Query::collection(collections::SQUADS))
            .await
    }

    pub async fn get_users_in_squad(&self, code: &str) -> Result<Vec<User>, AppError> {
        self.query_typed(&Query::collection(collections::USERS).filter_eq("squad_code", code))
            .await
    }

    /// Users that have not switched notifications off.
    pub async fn get_notifiable_users(&self) -> Result<Vec<User>, AppError> {
        self.query_typed(
            &Query::collection(collections::USERS).filter_eq("notifications_enabled", true),
        )
        .await
    }

    pub async fn get_missions_for_user(&self, user_id: &str) -> Result<Vec<Mission>, AppError> {
        self.query_typed(&Query::collection(collections::MISSIONS).filter_eq("user_id", user_id))
            .await
    }

    /// Missions a user recorded on one local day ("YYYY-MM-DD").
    pub async fn get_missions_for_day(
        &self,
        user_id: &str,
        date: &str,
    ) -> Result<Vec<Mission>, AppError> {
        self.query_typed(
            &Query::collection(collections::MISSIONS)
                .filter_eq("user_id", user_id)
                .filter_eq("date", date),
        )
        .await
    }

    /// Entries of a weekly ranking by descending weekly XP.
    pub async fn get_ranking_entries(
        &self,
        ranking_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<RankingEntry>, AppError> {
        let mut query = Query::collection(paths::ranking_entries(ranking_id))
            .order_by("weekly_xp", Direction::Descending);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        self.query_typed(&query).await
    }

    pub async fn count_ranking_entries(&self, ranking_id: &str) -> Result<usize, AppError> {
        Ok(self
            .store
            .count(&Query::collection(paths::ranking_entries(ranking_id)))
            .await?)
    }

    /// Entries of a weekly ranking with strictly more XP than `weekly_xp`.
    pub async fn count_ranking_entries_above(
        &self,
        ranking_id: &str,
        weekly_xp: u64,
    ) -> Result<usize, AppError> {
        Ok(self
            .store
            .count(
                &Query::collection(paths::ranking_entries(ranking_id))
                    .filter_gt("weekly_xp", weekly_xp),
            )
            .await?)
    }

    // ─── Writes ────────────────────────────────────────────────────

    /// Store a new user profile. Fails with contention if one exists.
    pub async fn create_user(&self, user: &User) -> Result<(), AppError> {
        let write = Write::set(paths::user(&user.id), user)?.when(Precondition::Missing);
        self.commit(vec![write]).await
    }

    /// Delete documents in bounded commits.
    async fn batch_delete(&self, docs: Vec<DocPath>) -> Result<usize, AppError> {
        let count = docs.len();
        let mut docs = docs.into_iter().peekable();
        while docs.peek().is_some() {
            let chunk: Vec<Write> = docs.by_ref().take(BATCH_SIZE).map(Write::delete).collect();
            self.commit(chunk).await?;
        }
        Ok(count)
    }

    // ─── User Data Deletion ────────────────────────────────────────

    /// Delete a user's missions and ranking entries.
    ///
    /// The profile itself is deleted by the caller, in the commit that
    /// releases its squad slot. Ranking entries are found through the
    /// `entries` collection group, across every week.
    ///
    /// Returns the number of documents deleted.
    pub async fn delete_user_data(&self, user_id: &str) -> Result<usize, AppError> {
        let mut deleted_count = 0;

        // 1. Ranking entries in every squad and week
        let entries: Vec<DocPath> = self
            .store
            .query(&Query::group(collections::ENTRIES).filter_eq("user_id", user_id))
            .await?
            .into_iter()
            .map(|snap| snap.path)
            .collect();
        let count = self.batch_delete(entries).await?;
        deleted_count += count;
        tracing::debug!(user_id, count, "Deleted ranking entries");

        // 2. Missions
        let missions: Vec<DocPath> = self
            .store
            .query(&Query::collection(collections::MISSIONS).filter_eq("user_id", user_id))
            .await?
            .into_iter()
            .map(|snap| snap.path)
            .collect();
        let count = self.batch_delete(missions).await?;
        deleted_count += count;
        tracing::debug!(user_id, count, "Deleted missions");

        tracing::info!(user_id, deleted_count, "User data deletion complete");

        Ok(deleted_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(25),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(25));
        assert_eq!(policy.delay_for(2), Duration::from_millis(50));
        assert_eq!(policy.delay_for(3), Duration::from_millis(100));
        assert_eq!(policy.delay_for(30), MAX_RETRY_DELAY);
    }

    #[tokio::test]
    async fn test_run_transaction_retries_contention() {
        let db = Db::new_mock();
        let calls = &AtomicU32::new(0);

        let result = db
            .run_transaction("flaky", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(AppError::Contention("users/u1".into()))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_transaction_gives_up() {
        let db = Db::new_mock();
        let calls = &AtomicU32::new(0);

        let result: Result<(), AppError> = db
            .run_transaction("always_conflicts", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::Contention("users/u1".into()))
            })
            .await;

        assert!(matches!(result, Err(AppError::Contention(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_run_transaction_does_not_retry_other_errors() {
        let db = Db::new_mock();
        let calls = &AtomicU32::new(0);

        let result: Result<(), AppError> = db
            .run_transaction("fails", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::SquadFull)
            })
            .await;

        assert!(matches!(result, Err(AppError::SquadFull)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_create_user_twice_conflicts() {
        let db = Db::new_mock();
        let user = User::new("u1", "Ana", None, chrono::Utc::now());
        db.create_user(&user).await.unwrap();
        assert!(matches!(
            db.create_user(&user).await,
            Err(AppError::Contention(_))
        ));
        assert_eq!(db.get_user("u1").await.unwrap().unwrap().name, "Ana");
    }
}
