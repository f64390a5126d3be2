// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process [`DocumentStore`] for tests and benchmarks.
//!
//! Follows the Firestore binding's semantics. Commits are serialized behind one lock; every document written by a commit
//! takes that commit's sequence number as its new version.

use super::store::{
    compare_values, DocPath, DocumentStore, Direction, Precondition, Query, Scope, Snapshot,
    StoreError, StoreResult, Write, WriteOp,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
struct StoredDoc {
    data: Map<String, Value>,
    version: u64,
}

#[derive(Debug, Default)]
struct Inner {
    /// collection path -> document id -> document
    collections: BTreeMap<String, BTreeMap<String, StoredDoc>>,
    sequence: u64,
}

impl Inner {
    fn doc(&self, path: &DocPath) -> Option<&StoredDoc> {
        self.collections
            .get(&path.collection)
            .and_then(|docs| docs.get(&path.id))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }

    /// Number of stored documents across all collections.
    pub fn len(&self) -> usize {
        self.read()
            .map(|inner| inner.collections.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn check_precondition(current: Option<&StoredDoc>, write: &Write) -> StoreResult<()> {
    let ok = match write.precondition {
        Precondition::None => true,
        Precondition::Exists => current.is_some(),
        Precondition::Missing => current.is_none(),
        Precondition::Version(v) => current.is_some_and(|doc| doc.version == v),
    };
    if ok {
        Ok(())
    } else {
        Err(StoreError::Conflict(write.path.to_string()))
    }
}

fn as_object(path: &DocPath, value: Value) -> StoreResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::InvalidWrite {
            path: path.to_string(),
            reason: "document body must be an object".to_string(),
        }),
    }
}

/// Apply one write to the working copy of a document.
fn apply(
    path: &DocPath,
    current: Option<Map<String, Value>>,
    op: WriteOp,
) -> StoreResult<Option<Map<String, Value>>> {
    let invalid = |reason: String| StoreError::InvalidWrite {
        path: path.to_string(),
        reason,
    };

    match op {
        WriteOp::Set(value) => Ok(Some(as_object(path, value)?)),
        WriteOp::Merge(value) => {
            let mut doc = current.unwrap_or_default();
            doc.extend(as_object(path, value)?);
            Ok(Some(doc))
        }
        WriteOp::Delete => Ok(None),
        WriteOp::Increment { field, by } => {
            let mut doc = current.unwrap_or_default();
            let base = match doc.get(&field) {
                None | Some(Value::Null) => 0,
                Some(Value::Number(n)) => n
                    .as_i64()
                    .ok_or_else(|| invalid(format!("field {field} is not an integer")))?,
                Some(_) => return Err(invalid(format!("field {field} is not a number"))),
            };
            let next = base
                .checked_add(by)
                .ok_or_else(|| invalid(format!("increment of {field} overflows")))?;
            doc.insert(field, Value::from(next));
            Ok(Some(doc))
        }
        WriteOp::ArrayUnion { field, values } => {
            let mut doc = current.unwrap_or_default();
            let mut items = match doc.remove(&field) {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items,
                Some(_) => return Err(invalid(format!("field {field} is not an array"))),
            };
            for value in values {
                if !items.contains(&value) {
                    items.push(value);
                }
            }
            doc.insert(field, Value::Array(items));
            Ok(Some(doc))
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> StoreResult<Snapshot> {
        let inner = self.read()?;
        Ok(match inner.doc(path) {
            Some(doc) => Snapshot {
                path: path.clone(),
                data: Some(Value::Object(doc.data.clone())),
                version: doc.version,
            },
            None => Snapshot::missing(path.clone()),
        })
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Snapshot>> {
        let inner = self.read()?;

        let mut results: Vec<Snapshot> = inner
            .collections
            .iter()
            .filter(|(collection, _)| match &query.scope {
                Scope::Collection(name) => *collection == name,
                Scope::Group(name) => {
                    collection.rsplit('/').next() == Some(name.as_str())
                }
            })
            .flat_map(|(collection, docs)| {
                docs.iter()
                    .filter(move |(_, doc)| query.matches(&doc.data))
                    .map(move |(id, doc)| Snapshot {
                        path: DocPath::new(collection.clone(), id.clone()),
                        data: Some(Value::Object(doc.data.clone())),
                        version: doc.version,
                    })
            })
            .collect();

        if let Some((field, direction)) = &query.order_by {
            let key = |snap: &Snapshot| {
                snap.data
                    .as_ref()
                    .and_then(|d| d.get(field))
                    .cloned()
                    .unwrap_or(Value::Null)
            };
            // stable: ties keep document-id order
            results.sort_by(|a, b| {
                let ord = compare_values(&key(a), &key(b)).unwrap_or(std::cmp::Ordering::Equal);
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            results.truncate(limit);
        }

        Ok(results)
    }

    async fn commit(&self, writes: Vec<Write>) -> StoreResult<()> {
        let mut inner = self.write()?;

        for write in &writes {
            check_precondition(inner.doc(&write.path), write)?;
        }

        // staged, so an invalid write leaves the store untouched
        let mut staged: BTreeMap<DocPath, Option<Map<String, Value>>> = BTreeMap::new();
        for write in writes {
            let current = match staged.remove(&write.path) {
                Some(doc) => doc,
                None => inner.doc(&write.path).map(|doc| doc.data.clone()),
            };
            let next = apply(&write.path, current, write.op)?;
            staged.insert(write.path, next);
        }

        inner.sequence += 1;
        let version = inner.sequence;
        for (path, doc) in staged {
            match doc {
                Some(data) => {
                    inner
                        .collections
                        .entry(path.collection)
                        .or_default()
                        .insert(path.id, StoredDoc { data, version });
                }
                None => {
                    if let Some(docs) = inner.collections.get_mut(&path.collection) {
                        docs.remove(&path.id);
                        if docs.is_empty() {
                            inner.collections.remove(&path.collection);
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(id: &str) -> DocPath {
        DocPath::new("squads", id)
    }

    #[tokio::test]
    async fn test_get_missing_has_version_zero() {
        let store = MemoryStore::new();
        let snap = store.get(&path("NOPE00")).await.unwrap();
        assert!(!snap.exists());
        assert_eq!(snap.version, 0);
    }

    #[tokio::test]
    async fn test_set_then_get_bumps_version() {
        let store = MemoryStore::new();
        store
            .commit(vec![Write::set(path("A"), &json!({"n": 1})).unwrap()])
            .await
            .unwrap();
        let first = store.get(&path("A")).await.unwrap();
        store
            .commit(vec![Write::merge(path("A"), json!({"m": 2}))])
            .await
            .unwrap();
        let second = store.get(&path("A")).await.unwrap();

        assert!(second.version > first.version);
        assert_eq!(second.data.unwrap(), json!({"n": 1, "m": 2}));
    }

    #[tokio::test]
    async fn test_failed_precondition_rejects_whole_commit() {
        let store = MemoryStore::new();
        store
            .commit(vec![Write::set(path("A"), &json!({"n": 1})).unwrap()])
            .await
            .unwrap();

        let result = store
            .commit(vec![
                Write::set(path("B"), &json!({"n": 2})).unwrap(),
                Write::set(path("A"), &json!({"n": 3}))
                    .unwrap()
                    .when(Precondition::Missing),
            ])
            .await;

        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert!(!store.get(&path("B")).await.unwrap().exists());
        assert_eq!(
            store.get(&path("A")).await.unwrap().data.unwrap(),
            json!({"n": 1})
        );
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let store = MemoryStore::new();
        store
            .commit(vec![Write::set(path("A"), &json!({"n": 1})).unwrap()])
            .await
            .unwrap();
        let snap = store.get(&path("A")).await.unwrap();
        store
            .commit(vec![Write::increment(path("A"), "n", 1)])
            .await
            .unwrap();

        let result = store
            .commit(vec![Write::increment(path("A"), "n", 1).when(snap.unchanged())])
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_increment_and_array_union_compose_in_one_commit() {
        let store = MemoryStore::new();
        store
            .commit(vec![
                Write::increment(path("A"), "xp", 50),
                Write::array_union(path("A"), "tags", vec![json!("breakfast")]),
                Write::array_union(path("A"), "tags", vec![json!("breakfast"), json!("lunch")]),
                Write::increment(path("A"), "xp", -20),
            ])
            .await
            .unwrap();

        let doc = store.get(&path("A")).await.unwrap().data.unwrap();
        assert_eq!(doc["xp"], json!(30));
        assert_eq!(doc["tags"], json!(["breakfast", "lunch"]));
    }

    #[tokio::test]
    async fn test_increment_non_number_is_invalid() {
        let store = MemoryStore::new();
        store
            .commit(vec![Write::set(path("A"), &json!({"xp": "lots"})).unwrap()])
            .await
            .unwrap();
        let result = store.commit(vec![Write::increment(path("A"), "xp", 1)]).await;
        assert!(matches!(result, Err(StoreError::InvalidWrite { .. })));
    }

    #[tokio::test]
    async fn test_query_order_limit_and_group() {
        let store = MemoryStore::new();
        let entries = |week: &str| format!("weekly_rankings/SQUAD1_{week}/entries");
        store
            .commit(vec![
                Write::set(DocPath::new(entries("2026-41"), "u1"), &json!({"user_id": "u1", "xp": 10}))
                    .unwrap(),
                Write::set(DocPath::new(entries("2026-42"), "u1"), &json!({"user_id": "u1", "xp": 40}))
                    .unwrap(),
                Write::set(DocPath::new(entries("2026-42"), "u2"), &json!({"user_id": "u2", "xp": 40}))
                    .unwrap(),
                Write::set(DocPath::new(entries("2026-42"), "u3"), &json!({"user_id": "u3", "xp": 90}))
                    .unwrap(),
            ])
            .await
            .unwrap();

        let ranked = store
            .query(
                &Query::collection(entries("2026-42"))
                    .order_by("xp", Direction::Descending)
                    .limit(2),
            )
            .await
            .unwrap();
        let ids: Vec<_> = ranked.iter().map(|s| s.path.id.as_str()).collect();
        assert_eq!(ids, vec!["u3", "u1"]);

        let mine = store
            .query(&Query::group("entries").filter_eq("user_id", "u1"))
            .await
            .unwrap();
        assert_eq!(mine.len(), 2);

        let above = store
            .count(&Query::collection(entries("2026-42")).filter_gt("xp", 40))
            .await
            .unwrap();
        assert_eq!(above, 1);
    }

    #[tokio::test]
    async fn test_delete_removes_document() {
        let store = MemoryStore::new();
        store
            .commit(vec![Write::set(path("A"), &json!({"n": 1})).unwrap()])
            .await
            .unwrap();
        store
            .commit(vec![Write::delete(path("A")).when(Precondition::Exists)])
            .await
            .unwrap();
        assert!(store.is_empty());
    }
}
