// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore binding for [`DocumentStore`].
//!
//! - `collection/id` paths map one-to-one onto Firestore documents, nested
//!   collections through the parent document path
//! - a document's version is its update time in nanoseconds, so
//!   `Precondition::Version` becomes an update-time precondition
//! - every commit is one Firestore transaction
//! - counters and set-union arrays use server-side field transforms

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::errors::FirestoreError;
use firestore::{
    FirestoreDb, FirestoreQueryDirection, FirestoreTransaction, FirestoreWritePrecondition,
};
use gcloud_sdk::google::firestore::v1::Document;
use serde_json::Value;

use crate::db::store::{
    Direction, DocPath, DocumentStore, FilterOp, Precondition, Query, Scope, Snapshot,
    StoreError, StoreResult, Write, WriteOp,
};

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Firestore-backed document store.
#[derive(Clone)]
pub struct FirestoreStore {
    client: FirestoreDb,
}

impl FirestoreStore {
    /// Connect to Firestore.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> StoreResult<Self> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = FirestoreDb::new(project_id)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to connect to Firestore: {e}")))?;

        tracing::info!(project = project_id, "Connected to Firestore");
        Ok(Self { client })
    }

    /// Emulator client with a dummy token, so no local credentials are used.
    async fn create_emulator_client(project_id: &str) -> StoreResult<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJlbXVsYXRvciJ9."
                        .to_string()
                        .into(),
                ),
                expiry: Utc::now() + chrono::Duration::hours(1),
            })
        });

        let client = FirestoreDb::with_options_token_source(
            firestore::FirestoreDbOptions::new(project_id.to_string()),
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            StoreError::Backend(format!("Failed to connect to Firestore Emulator: {e}"))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );
        Ok(Self { client })
    }

    /// Parent document path and collection id for a collection path.
    fn locate(&self, collection: &str) -> StoreResult<(String, String)> {
        let (parent, id) = split_collection(collection)?;
        let root: &str = self.client.get_documents_path();
        let parent = match parent {
            Some(parent) => format!("{root}/{parent}"),
            None => root.to_string(),
        };
        Ok((parent, id.to_string()))
    }

    fn snapshot(&self, doc: &Document) -> StoreResult<Snapshot> {
        let root: &str = self.client.get_documents_path();
        let relative = doc
            .name
            .strip_prefix(root)
            .map(|rest| rest.trim_start_matches('/'))
            .ok_or_else(|| StoreError::Backend(format!("unexpected document name {}", doc.name)))?;
        let (collection, id) = relative
            .rsplit_once('/')
            .ok_or_else(|| StoreError::Backend(format!("unexpected document name {}", doc.name)))?;

        let data: Value = FirestoreDb::deserialize_doc_to(doc)
            .map_err(|e| StoreError::Serialization(format!("{relative}: {e}")))?;
        let version = doc
            .update_time
            .as_ref()
            .map(|ts| version_from_parts(ts.seconds, ts.nanos))
            .unwrap_or(1);

        Ok(Snapshot {
            path: DocPath::new(collection, id),
            data: Some(data),
            version,
        })
    }

    /// Add one write to the transaction.
    fn stage(&self, write: &Write, transaction: &mut FirestoreTransaction<'_>) -> StoreResult<()> {
        let (parent, collection) = self.locate(&write.path.collection)?;
        let id = write.path.id.as_str();
        let precondition = to_precondition(write)?;

        let staged = match &write.op {
            WriteOp::Set(doc) => {
                let update = self.client.fluent().update().in_col(&collection);
                let update = match precondition {
                    Some(p) => update.precondition(p),
                    None => update,
                };
                update
                    .document_id(id)
                    .parent(&parent)
                    .object(doc)
                    .add_to_transaction(transaction)
            }
            WriteOp::Merge(fields) => {
                let mask: Vec<String> = fields
                    .as_object()
                    .ok_or_else(|| StoreError::InvalidWrite {
                        path: write.path.to_string(),
                        reason: "merge body must be an object".to_string(),
                    })?
                    .keys()
                    .cloned()
                    .collect();
                let update = self
                    .client
                    .fluent()
                    .update()
                    .fields(mask)
                    .in_col(&collection);
                let update = match precondition {
                    Some(p) => update.precondition(p),
                    None => update,
                };
                update
                    .document_id(id)
                    .parent(&parent)
                    .object(fields)
                    .add_to_transaction(transaction)
            }
            WriteOp::Delete => {
                let delete = self
                    .client
                    .fluent()
                    .delete()
                    .from(collection.as_str())
                    .document_id(id)
                    .parent(&parent);
                match precondition {
                    Some(p) => delete.precondition(p).add_to_transaction(transaction),
                    None => delete.add_to_transaction(transaction),
                }
            }
            WriteOp::Increment { field, by } => {
                let by = *by;
                let update = self.client.fluent().update().in_col(&collection);
                let update = match precondition {
                    Some(p) => update.precondition(p),
                    None => update,
                };
                update
                    .document_id(id)
                    .parent(&parent)
                    .transforms(|t| t.fields([t.field(field.as_str()).increment(by)]))
                    .only_transform()
                    .add_to_transaction(transaction)
            }
            WriteOp::ArrayUnion { field, values } => {
                let update = self.client.fluent().update().in_col(&collection);
                let update = match precondition {
                    Some(p) => update.precondition(p),
                    None => update,
                };
                update
                    .document_id(id)
                    .parent(&parent)
                    .transforms(|t| {
                        t.fields([t
                            .field(field.as_str())
                            .append_missing_elements(values.clone())])
                    })
                    .only_transform()
                    .add_to_transaction(transaction)
            }
        };

        staged.map(|_| ()).map_err(|e| {
            StoreError::Backend(format!("Failed to add {} to transaction: {e}", write.path))
        })
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get(&self, path: &DocPath) -> StoreResult<Snapshot> {
        let (parent, collection) = self.locate(&path.collection)?;
        let doc = self
            .client
            .fluent()
            .select()
            .by_id_in(&collection)
            .parent(&parent)
            .one(&path.id)
            .await
            .map_err(to_store_error)?;

        match doc {
            Some(doc) => self.snapshot(&doc),
            None => Ok(Snapshot::missing(path.clone())),
        }
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Snapshot>> {
        let select = self.client.fluent().select();
        let select = match &query.scope {
            Scope::Collection(collection) => {
                let (parent, collection) = self.locate(collection)?;
                select.from(collection.as_str()).parent(parent)
            }
            Scope::Group(name) => select.from(name.as_str()).all_descendants(),
        };

        let filters = query.filters.clone();
        let select = if filters.is_empty() {
            select
        } else {
            select.filter(move |q| {
                q.for_all(filters.iter().map(|f| match f.op {
                    FilterOp::Eq => q.field(f.field.as_str()).eq(f.value.clone()),
                    FilterOp::Gt => q.field(f.field.as_str()).greater_than(f.value.clone()),
                }))
            })
        };

        let select = match &query.order_by {
            Some((field, direction)) => {
                let direction = match direction {
                    Direction::Ascending => FirestoreQueryDirection::Ascending,
                    Direction::Descending => FirestoreQueryDirection::Descending,
                };
                select.order_by([(field.as_str(), direction)])
            }
            None => select,
        };

        let select = match query.limit {
            Some(limit) => select.limit(u32::try_from(limit).unwrap_or(u32::MAX)),
            None => select,
        };

        let docs = select.query().await.map_err(to_store_error)?;
        docs.iter().map(|doc| self.snapshot(doc)).collect()
    }

    async fn commit(&self, writes: Vec<Write>) -> StoreResult<()> {
        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(to_store_error)?;

        for write in &writes {
            if let Err(e) = self.stage(write, &mut transaction) {
                let _ = transaction.rollback().await;
                return Err(e);
            }
        }

        transaction.commit().await.map_err(to_store_error)?;
        Ok(())
    }
}

/// `weekly_rankings/R/entries` -> (`Some("weekly_rankings/R")`, `entries`).
fn split_collection(collection: &str) -> StoreResult<(Option<&str>, &str)> {
    let segments = collection.split('/').count();
    if collection.is_empty() || segments % 2 == 0 {
        return Err(StoreError::InvalidWrite {
            path: collection.to_string(),
            reason: "not a collection path".to_string(),
        });
    }
    Ok(match collection.rsplit_once('/') {
        Some((parent, id)) => (Some(parent), id),
        None => (None, collection),
    })
}

fn version_from_parts(seconds: i64, nanos: i32) -> u64 {
    let seconds = u64::try_from(seconds).unwrap_or(0);
    let nanos = u64::try_from(nanos).unwrap_or(0);
    (seconds * NANOS_PER_SECOND + nanos).max(1)
}

fn update_time(version: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(version / NANOS_PER_SECOND).ok()?;
    let nanos = u32::try_from(version % NANOS_PER_SECOND).ok()?;
    DateTime::from_timestamp(seconds, nanos)
}

fn to_precondition(write: &Write) -> StoreResult<Option<FirestoreWritePrecondition>> {
    Ok(match write.precondition {
        Precondition::None => None,
        Precondition::Exists => Some(FirestoreWritePrecondition::Exists(true)),
        Precondition::Missing => Some(FirestoreWritePrecondition::Exists(false)),
        Precondition::Version(version) => {
            let at = update_time(version).ok_or_else(|| StoreError::InvalidWrite {
                path: write.path.to_string(),
                reason: format!("version {version} is not an update time"),
            })?;
            Some(FirestoreWritePrecondition::UpdateTime(at))
        }
    })
}

/// Failed preconditions and aborted transactions are conflicts; the caller
/// retries them. Everything else is a backend error.
fn to_store_error(err: FirestoreError) -> StoreError {
    match err {
        FirestoreError::DataConflictError(e) => StoreError::Conflict(e.to_string()),
        FirestoreError::DataNotFoundError(e) => StoreError::Conflict(e.to_string()),
        FirestoreError::DatabaseError(e) if e.retry_possible => StoreError::Conflict(e.to_string()),
        other => {
            let message = other.to_string();
            if is_precondition_failure(&message) {
                StoreError::Conflict(message)
            } else {
                StoreError::Backend(message)
            }
        }
    }
}

fn is_precondition_failure(message: &str) -> bool {
    ["FailedPrecondition", "FAILED_PRECONDITION", "Aborted", "ABORTED"]
        .iter()
        .any(|code| message.contains(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_collection() {
        assert_eq!(split_collection("users").unwrap(), (None, "users"));
        assert_eq!(
            split_collection("weekly_rankings/ABC123_2026-42/entries").unwrap(),
            (Some("weekly_rankings/ABC123_2026-42"), "entries")
        );
        assert!(split_collection("users/u1").is_err());
        assert!(split_collection("").is_err());
    }

    #[test]
    fn test_version_is_update_time() {
        let version = version_from_parts(1_760_000_000, 123_456_000);
        assert_eq!(version, 1_760_000_000_123_456_000);

        let at = update_time(version).unwrap();
        assert_eq!(at.timestamp(), 1_760_000_000);
        assert_eq!(at.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn test_version_never_reads_as_missing() {
        assert_eq!(version_from_parts(0, 0), 1);
        assert_eq!(version_from_parts(-5, 0), 1);
    }

    #[test]
    fn test_preconditions() {
        let path = DocPath::new("squads", "ABC123");
        let write = |p| Write::delete(path.clone()).when(p);

        assert!(to_precondition(&write(Precondition::None)).unwrap().is_none());
        assert!(matches!(
            to_precondition(&write(Precondition::Missing)).unwrap(),
            Some(FirestoreWritePrecondition::Exists(false))
        ));
        assert!(matches!(
            to_precondition(&write(Precondition::Exists)).unwrap(),
            Some(FirestoreWritePrecondition::Exists(true))
        ));
        assert!(matches!(
            to_precondition(&write(Precondition::Version(2_000_000_001))).unwrap(),
            Some(FirestoreWritePrecondition::UpdateTime(at)) if at.timestamp() == 2
        ));
    }

    #[test]
    fn test_precondition_failures_are_conflicts() {
        assert!(is_precondition_failure(
            "Database general error occurred: status: FailedPrecondition"
        ));
        assert!(is_precondition_failure("ABORTED: too much contention"));
        assert!(!is_precondition_failure("PermissionDenied"));
    }
}
