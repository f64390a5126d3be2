// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Squad model and invite code rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Characters an invite code is drawn from.
pub const CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const CODE_LENGTH: usize = 6;
pub const MIN_NAME_LENGTH: usize = 2;
pub const MAX_NAME_LENGTH: usize = 50;

/// A group of users competing in a weekly ranking.
///
/// Stored at: `squads/{code}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Squad {
    /// Invite code (also used as document ID)
    pub code: String,
    pub name: String,
    pub owner_user_id: String,
    /// Users whose `squad_code` is this squad
    pub member_count: u32,
    pub max_members: u32,
    pub created_at: DateTime<Utc>,
    /// Set while the owner's delete sweeps members out; joins are refused
    #[serde(default)]
    pub deleting: bool,
}

impl Squad {
    pub fn is_full(&self) -> bool {
        self.member_count >= self.max_members
    }

    pub fn available_spots(&self) -> u32 {
        self.max_members.saturating_sub(self.member_count)
    }
}

/// Canonical form of a user-typed invite code.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// True for exactly six characters from [`CODE_ALPHABET`].
pub fn is_valid_code(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
}
