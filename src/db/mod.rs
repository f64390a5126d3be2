//! Database layer (document store).

pub mod client;
pub mod firestore;
pub mod memory;
pub mod store;

pub use self::firestore::FirestoreStore;
pub use client::{Db, RetryPolicy};
pub use memory::MemoryStore;
pub use store::{
    DocPath, DocumentStore, Precondition, Query, Snapshot, StoreError, StoreResult, Write,
};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const SQUADS: &str = "squads";
    pub const MISSIONS: &str = "missions";
    pub const WEEKLY_RANKINGS: &str = "weekly_rankings";
    /// Subcollection of each weekly ranking (collection-group name)
    pub const ENTRIES: &str = "entries";
}

/// Document locations.
pub mod paths {
    use super::collections;
    use super::store::DocPath;
    use crate::models::{Mission, MissionType};

    pub fn user(user_id: &str) -> DocPath {
        DocPath::new(collections::USERS, user_id)
    }

    pub fn squad(code: &str) -> DocPath {
        DocPath::new(collections::SQUADS, code)
    }

    pub fn mission(user_id: &str, date: &str, mission_type: MissionType) -> DocPath {
        DocPath::new(
            collections::MISSIONS,
            Mission::document_id(user_id, date, mission_type),
        )
    }

    pub fn ranking(ranking_id: &str) -> DocPath {
        DocPath::new(collections::WEEKLY_RANKINGS, ranking_id)
    }

    /// Collection path holding the entries of one weekly ranking.
    pub fn ranking_entries(ranking_id: &str) -> String {
        format!(
            "{}/{}/{}",
            collections::WEEKLY_RANKINGS,
            ranking_id,
            collections::ENTRIES
        )
    }

    pub fn ranking_entry(ranking_id: &str, user_id: &str) -> DocPath {
        DocPath::new(ranking_entries(ranking_id), user_id)
    }
}
