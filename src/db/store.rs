// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Document store contract.
//!
//! Implemented by [`FirestoreStore`](crate::db::FirestoreStore) in production
//! and [`MemoryStore`](crate::db::MemoryStore) in tests. What the game logic
//! relies on:
//! - single-document reads carrying a version (0 = absent)
//! - equality / range queries, optionally across a collection group
//! - atomic multi-document commits with per-write preconditions
//! - server-side counter increments and set-union array updates

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by a document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A precondition failed; the whole commit was rejected.
    #[error("write conflict on {0}")]
    Conflict(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid write on {path}: {reason}")]
    InvalidWrite { path: String, reason: String },

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Location of a document: `collection/id`, where the collection may itself
/// be nested (`weekly_rankings/ABC123_2026-42/entries`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    pub collection: String,
    pub id: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Last segment of the collection path, used for collection-group queries.
    pub fn group(&self) -> &str {
        self.collection
            .rsplit('/')
            .next()
            .unwrap_or(self.collection.as_str())
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A document as read at a given version.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub path: DocPath,
    pub data: Option<Value>,
    pub version: u64,
}

impl Snapshot {
    pub fn missing(path: DocPath) -> Self {
        Self {
            path,
            data: None,
            version: 0,
        }
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// Deserialize the document body, if present.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<Option<T>> {
        self.data
            .as_ref()
            .map(|value| {
                serde_json::from_value(value.clone()).map_err(|e| {
                    StoreError::Serialization(format!("{}: {}", self.path, e))
                })
            })
            .transpose()
    }

    /// Precondition asserting the document is still exactly as read.
    pub fn unchanged(&self) -> Precondition {
        if self.exists() {
            Precondition::Version(self.version)
        } else {
            Precondition::Missing
        }
    }
}

/// Condition checked against the pre-commit state of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    None,
    Exists,
    /// Create semantics: the commit fails if the document exists.
    Missing,
    /// Optimistic concurrency: the document must still be at this version.
    Version(u64),
}

#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Replace the whole document.
    Set(Value),
    /// Shallow merge of top-level fields; creates the document if absent.
    Merge(Value),
    Delete,
    /// Atomic counter update; an absent field counts as zero.
    Increment { field: String, by: i64 },
    /// Append values not already present; an absent field counts as empty.
    ArrayUnion { field: String, values: Vec<Value> },
}

#[derive(Debug, Clone)]
pub struct Write {
    pub path: DocPath,
    pub op: WriteOp,
    pub precondition: Precondition,
}

impl Write {
    fn new(path: DocPath, op: WriteOp) -> Self {
        Self {
            path,
            op,
            precondition: Precondition::None,
        }
    }

    pub fn set<T: Serialize>(path: DocPath, doc: &T) -> StoreResult<Self> {
        Ok(Self::new(path, WriteOp::Set(to_document(doc)?)))
    }

    pub fn merge(path: DocPath, fields: Value) -> Self {
        Self::new(path, WriteOp::Merge(fields))
    }

    pub fn delete(path: DocPath) -> Self {
        Self::new(path, WriteOp::Delete)
    }

    pub fn increment(path: DocPath, field: &str, by: i64) -> Self {
        Self::new(
            path,
            WriteOp::Increment {
                field: field.to_string(),
                by,
            },
        )
    }

    pub fn array_union(path: DocPath, field: &str, values: Vec<Value>) -> Self {
        Self::new(
            path,
            WriteOp::ArrayUnion {
                field: field.to_string(),
                values,
            },
        )
    }

    pub fn when(mut self, precondition: Precondition) -> Self {
        self.precondition = precondition;
        self
    }
}

/// Serialize a model into a document body (must be a JSON object).
pub fn to_document<T: Serialize>(doc: &T) -> StoreResult<Value> {
    let value = serde_json::to_value(doc).map_err(|e| StoreError::Serialization(e.to_string()))?;
    if !value.is_object() {
        return Err(StoreError::Serialization(
            "documents must serialize to JSON objects".to_string(),
        ));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Collection(String),
    /// Every collection whose last path segment matches.
    Group(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
}

#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Query builder, loosely following the fluent style of document SDKs.
#[derive(Debug, Clone)]
pub struct Query {
    pub scope: Scope,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(collection: impl Into<String>) -> Self {
        Self::scoped(Scope::Collection(collection.into()))
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::scoped(Scope::Group(name.into()))
    }

    fn scoped(scope: Scope) -> Self {
        Self {
            scope,
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op: FilterOp::Eq,
            value: value.into(),
        });
        self
    }

    pub fn filter_gt(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op: FilterOp::Gt,
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluate the filters against a document body.
    pub fn matches(&self, doc: &Map<String, Value>) -> bool {
        self.filters.iter().all(|filter| {
            let Some(actual) = doc.get(&filter.field) else {
                return false;
            };
            match filter.op {
                FilterOp::Eq => compare_values(actual, &filter.value) == Some(Ordering::Equal),
                FilterOp::Gt => compare_values(actual, &filter.value) == Some(Ordering::Greater),
            }
        })
    }
}

/// Order two field values of the same JSON kind; mixed kinds are unordered.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Transactional document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document.
    async fn get(&self, path: &DocPath) -> StoreResult<Snapshot>;

    /// Run a query. Results follow document-id order unless ordered explicitly;
    /// explicit ordering is stable with respect to that order.
    async fn query(&self, query: &Query) -> StoreResult<Vec<Snapshot>>;

    /// Apply every write atomically, or none of them.
    ///
    /// Preconditions are evaluated against the state before the commit.
    async fn commit(&self, writes: Vec<Write>) -> StoreResult<()>;

    /// Count documents matching a query.
    async fn count(&self, query: &Query) -> StoreResult<usize> {
        Ok(self.query(query).await?.len())
    }
}
