// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Squad registry.
//!
//! Membership lives in two places that must agree: `users/{uid}.squad_code`
//! and `squads/{code}.member_count`. Every membership change commits both in
//! one transaction; the user write is version-checked so a clear and its
//! matching decrement happen exactly once.

use ring::rand::{SecureRandom, SystemRandom};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::db::{paths, Db, Precondition, Snapshot, Write};
use crate::error::AppError;
use crate::models::squad::{
    is_valid_code, normalize_code, CODE_ALPHABET, CODE_LENGTH, MAX_NAME_LENGTH, MIN_NAME_LENGTH,
};
use crate::models::{Squad, User};
use crate::time_utils::Clock;

/// Fresh codes tried before giving up on squad creation.
pub const MAX_CODE_ATTEMPTS: usize = 10;

/// Source of candidate invite codes.
pub trait CodeGenerator: Send + Sync {
    /// A candidate code, or `None` if no randomness was available.
    fn generate(&self) -> Option<String>;
}

/// Uniform codes from the system CSPRNG.
pub struct RandomCodeGenerator {
    rng: SystemRandom,
}

impl RandomCodeGenerator {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }
}

impl Default for RandomCodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> Option<String> {
        // Largest multiple of the alphabet size below 256, to avoid modulo bias.
        const LIMIT: u8 = (256 / CODE_ALPHABET.len() * CODE_ALPHABET.len()) as u8;

        let mut code = String::with_capacity(CODE_LENGTH);
        let mut buf = [0u8; 16];
        while code.len() < CODE_LENGTH {
            self.rng.fill(&mut buf).ok()?;
            for &b in buf.iter().filter(|&&b| b < LIMIT) {
                if code.len() == CODE_LENGTH {
                    break;
                }
                code.push(char::from(CODE_ALPHABET[usize::from(b) % CODE_ALPHABET.len()]));
            }
        }
        Some(code)
    }
}

#[derive(Clone)]
pub struct SquadRegistry {
    db: Db,
    clock: Arc<dyn Clock>,
    codes: Arc<dyn CodeGenerator>,
    max_members: u32,
}

/// Decrement of a squad's member count, if the squad still exists.
fn leave_write(old_squad: &Snapshot) -> Option<Write> {
    old_squad.exists().then(|| {
        Write::increment(old_squad.path.clone(), "member_count", -1).when(Precondition::Exists)
    })
}

impl SquadRegistry {
    pub fn new(
        db: Db,
        clock: Arc<dyn Clock>,
        codes: Arc<dyn CodeGenerator>,
        max_members: u32,
    ) -> Self {
        Self {
            db,
            clock,
            codes,
            max_members,
        }
    }

    async fn load_user(&self, user_id: &str) -> Result<(Snapshot, User), AppError> {
        let snap = self.db.get_doc(&paths::user(user_id)).await?;
        let user = snap
            .decode()?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))?;
        Ok((snap, user))
    }

    /// Create a squad owned by `owner_id`, who becomes its first member.
    ///
    /// An owner already in another squad leaves it in the same commit.
    pub async fn create_squad(&self, name: &str, owner_id: &str) -> Result<Squad, AppError> {
        let name = name.trim();
        let len = name.chars().count();
        if !(MIN_NAME_LENGTH..=MAX_NAME_LENGTH).contains(&len) {
            return Err(AppError::BadRequest(format!(
                "Squad name must be {MIN_NAME_LENGTH} to {MAX_NAME_LENGTH} characters"
            )));
        }

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let Some(code) = self.codes.generate() else {
                tracing::warn!(attempt, "Code generator produced no code");
                continue;
            };
            if !is_valid_code(&code) {
                tracing::warn!(attempt, code = %code, "Code generator produced an invalid code");
                continue;
            }

            let code = code.as_str();
            let created = self
                .db
                .run_transaction("create_squad", || async move {
                    self.try_create_squad(code, name, owner_id).await
                })
                .await?;

            match created {
                Some(squad) => {
                    tracing::info!(
                        squad_code = %squad.code,
                        owner_id,
                        attempt,
                        "Squad created"
                    );
                    return Ok(squad);
                }
                None => tracing::debug!(attempt, code, "Squad code collision"),
            }
        }

        Err(AppError::CodeGenerationFailed)
    }

    /// `Ok(None)` when the code is taken.
    async fn try_create_squad(
        &self,
        code: &str,
        name: &str,
        owner_id: &str,
    ) -> Result<Option<Squad>, AppError> {
        let squad_path = paths::squad(code);
        if self.db.get_doc(&squad_path).await?.exists() {
            return Ok(None);
        }

        let (user_snap, mut owner) = self.load_user(owner_id).await?;

        let squad = Squad {
            code: code.to_string(),
            name: name.to_string(),
            owner_user_id: owner_id.to_string(),
            member_count: 1,
            max_members: self.max_members,
            created_at: self.clock.now(),
            deleting: false,
        };

        let mut writes = vec![Write::set(squad_path, &squad)?.when(Precondition::Missing)];
        writes.extend(self.release_writes(&owner).await?);

        owner.squad_code = Some(code.to_string());
        owner.is_coach = true;
        writes.push(Write::set(user_snap.path.clone(), &owner)?.when(user_snap.unchanged()));

        self.db.commit(writes).await?;
        Ok(Some(squad))
    }

    /// Join the squad with invite code `raw_code`, leaving any current squad.
    ///
    /// The capacity check and the increment commit together with a version
    /// precondition on the squad, so concurrent joins cannot overfill it.
    pub async fn join_squad(&self, user_id: &str, raw_code: &str) -> Result<Squad, AppError> {
        let code = normalize_code(raw_code);
        if !is_valid_code(&code) {
            return Err(AppError::InvalidSquadCode);
        }
        let code = code.as_str();

        let squad = self
            .db
            .run_transaction("join_squad", || async move {
                self.try_join_squad(user_id, code).await
            })
            .await?;

        tracing::info!(user_id, squad_code = code, members = squad.member_count, "Joined squad");
        Ok(squad)
    }

    async fn try_join_squad(&self, user_id: &str, code: &str) -> Result<Squad, AppError> {
        let squad_snap = self.db.get_doc(&paths::squad(code)).await?;
        let mut squad: Squad = squad_snap
            .decode()?
            .filter(|squad: &Squad| !squad.deleting)
            .ok_or(AppError::SquadNotFound)?;
        let (user_snap, mut user) = self.load_user(user_id).await?;

        if user.squad_code.as_deref() == Some(code) {
            return Ok(squad);
        }
        if squad.is_full() {
            return Err(AppError::SquadFull);
        }

        let mut writes = vec![
            Write::increment(squad_snap.path.clone(), "member_count", 1)
                .when(squad_snap.unchanged()),
        ];
        writes.extend(self.release_writes(&user).await?);

        user.squad_code = Some(code.to_string());
        writes.push(Write::set(user_snap.path.clone(), &user)?.when(user_snap.unchanged()));

        self.db.commit(writes).await?;

        squad.member_count += 1;
        Ok(squad)
    }

    /// Leave the current squad. Returns the code left, `None` if there was none.
    pub async fn leave_squad(&self, user_id: &str) -> Result<Option<String>, AppError> {
        let left = self
            .db
            .run_transaction("leave_squad", || async move {
                let (user_snap, user) = self.load_user(user_id).await?;
                self.try_leave(user_snap, user, None).await
            })
            .await?;

        if let Some(code) = &left {
            tracing::info!(user_id, squad_code = %code, "Left squad");
        }
        Ok(left)
    }

    /// Writes releasing `user`'s squad slot, for the caller to commit along
    /// with its own version-checked write of the user.
    pub(crate) async fn release_writes(&self, user: &User) -> Result<Vec<Write>, AppError> {
        let Some(code) = user.squad_code.as_deref() else {
            return Ok(Vec::new());
        };
        let squad = self.db.get_doc(&paths::squad(code)).await?;
        Ok(leave_write(&squad).into_iter().collect())
    }

    /// Clear the user's membership, optionally only if it is `only_from`.
    async fn try_leave(
        &self,
        user_snap: Snapshot,
        mut user: User,
        only_from: Option<&str>,
    ) -> Result<Option<String>, AppError> {
        let Some(old_code) = user.squad_code.clone() else {
            return Ok(None);
        };
        if only_from.is_some_and(|code| code != old_code) {
            return Ok(None);
        }

        let mut writes = self.release_writes(&user).await?;
        user.squad_code = None;
        writes.push(Write::set(user_snap.path.clone(), &user)?.when(user_snap.unchanged()));

        self.db.commit(writes).await?;
        Ok(Some(old_code))
    }

    /// Take `member_id` out of squad `code`. False if they had already left.
    async fn remove_member(&self, member_id: &str, code: &str) -> Result<bool, AppError> {
        let left = self
            .db
            .run_transaction("remove_squad_member", || async move {
                let (user_snap, user) = self.load_user(member_id).await?;
                self.try_leave(user_snap, user, Some(code)).await
            })
            .await?;
        Ok(left.is_some())
    }

    /// Delete a squad: it stops taking joins, every member leaves, then the
    /// squad document goes.
    ///
    /// Returns the number of members removed.
    pub async fn delete_squad(&self, raw_code: &str, requester_id: &str) -> Result<usize, AppError> {
        let code = normalize_code(raw_code);
        if !is_valid_code(&code) {
            return Err(AppError::InvalidSquadCode);
        }
        let code = code.as_str();
        let path = &paths::squad(code);

        // Joins commit against the squad's version, so a join that read the
        // squad before this mark is rejected and retried against it.
        self.db
            .run_transaction("mark_squad_deleting", || async move {
                let snap = self.db.get_doc(path).await?;
                let squad: Squad = snap.decode()?.ok_or(AppError::SquadNotFound)?;
                if squad.owner_user_id != requester_id {
                    return Err(AppError::NotOwner);
                }
                if !squad.deleting {
                    self.db
                        .commit(vec![Write::merge(path.clone(), json!({ "deleting": true }))
                            .when(snap.unchanged())])
                        .await?;
                }
                Ok(())
            })
            .await?;

        let removed = &AtomicUsize::new(0);
        for member in self.db.get_users_in_squad(code).await? {
            if self.remove_member(&member.id, code).await? {
                removed.fetch_add(1, Ordering::Relaxed);
            }
        }

        // The delete is checked against the squad as read after the sweep;
        // stragglers are swept and the delete retried.
        self.db
            .run_transaction("delete_squad", || async move {
                let stragglers = self.db.get_users_in_squad(code).await?;
                if !stragglers.is_empty() {
                    for member in &stragglers {
                        if self.remove_member(&member.id, code).await? {
                            removed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    return Err(AppError::Contention(path.to_string()));
                }

                let snap = self.db.get_doc(path).await?;
                if snap.exists() {
                    self.db
                        .commit(vec![Write::delete(path.clone()).when(snap.unchanged())])
                        .await?;
                }
                Ok(())
            })
            .await?;

        let removed = removed.load(Ordering::Relaxed);
        tracing::info!(squad_code = code, requester_id, removed, "Squad deleted");
        Ok(removed)
    }

    pub async fn get_squad(&self, raw_code: &str) -> Result<Squad, AppError> {
        let code = normalize_code(raw_code);
        if !is_valid_code(&code) {
            return Err(AppError::InvalidSquadCode);
        }
        self.db
            .get_squad(&code)
            .await?
            .filter(|squad| !squad.deleting)
            .ok_or(AppError::SquadNotFound)
    }
}
