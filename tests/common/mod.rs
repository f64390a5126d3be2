// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use futures_util::future::BoxFuture;
use nutrigame::config::Config;
use nutrigame::db::store::WriteOp;
use nutrigame::db::{DocPath, DocumentStore, MemoryStore, Query, Snapshot, StoreResult, Write};
use nutrigame::middleware::auth::create_jwt;
use nutrigame::routes::create_router;
use nutrigame::services::{
    CodeGenerator, NewProfile, NotifyError, PushDispatcher, PushMessage, RandomCodeGenerator,
};
use nutrigame::time_utils::FixedClock;
use nutrigame::AppState;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};
use tower::ServiceExt;

/// Records every push instead of delivering it.
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<PushMessage>>,
}

impl RecordingDispatcher {
    pub fn sent(&self) -> Vec<PushMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Pushes whose `data.type` is `kind`.
    pub fn of_kind(&self, kind: &str) -> Vec<PushMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.data.get("type").map(String::as_str) == Some(kind))
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl PushDispatcher for RecordingDispatcher {
    async fn send(&self, message: &PushMessage) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Hands out queued codes first, then random ones.
#[derive(Default)]
pub struct ScriptedCodes {
    queue: Mutex<VecDeque<String>>,
    fallback: RandomCodeGenerator,
}

impl ScriptedCodes {
    pub fn push(&self, codes: &[&str]) {
        let mut queue = self.queue.lock().unwrap();
        queue.extend(codes.iter().map(|c| c.to_string()));
    }
}

impl CodeGenerator for ScriptedCodes {
    fn generate(&self) -> Option<String> {
        let next = self.queue.lock().unwrap().pop_front();
        next.or_else(|| self.fallback.generate())
    }
}

type Interleaving = Box<dyn FnOnce(Arc<AppState>) -> BoxFuture<'static, ()> + Send>;

/// Store that runs another operation right before the first commit that
/// deletes `target`, to pin down how the two interleave.
pub struct InterleavingStore {
    inner: MemoryStore,
    target: DocPath,
    before_delete: Mutex<Option<Interleaving>>,
    state: OnceLock<Arc<AppState>>,
}

#[async_trait]
impl DocumentStore for InterleavingStore {
    async fn get(&self, path: &DocPath) -> StoreResult<Snapshot> {
        self.inner.get(path).await
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Snapshot>> {
        self.inner.query(query).await
    }

    async fn commit(&self, writes: Vec<Write>) -> StoreResult<()> {
        let deletes_target = writes
            .iter()
            .any(|w| w.path == self.target && matches!(w.op, WriteOp::Delete));
        if deletes_target {
            let before = self.before_delete.lock().unwrap().take();
            if let (Some(before), Some(state)) = (before, self.state.get()) {
                before(state.clone()).await;
            }
        }
        self.inner.commit(writes).await
    }
}

/// Test app whose store runs `before` just ahead of the delete of `target`.
pub fn create_interleaved_app<F>(target: DocPath, before: F) -> TestApp
where
    F: FnOnce(Arc<AppState>) -> BoxFuture<'static, ()> + Send + 'static,
{
    let store = Arc::new(InterleavingStore {
        inner: MemoryStore::new(),
        target,
        before_delete: Mutex::new(Some(Box::new(before))),
        state: OnceLock::new(),
    });
    let app = create_test_app_with(Config::test_default(), store.clone());
    let _ = store.state.set(app.state.clone());
    app
}

pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub clock: Arc<FixedClock>,
    pub pushes: Arc<RecordingDispatcher>,
    pub codes: Arc<ScriptedCodes>,
}

/// Wednesday 2026-10-14 10:00 UTC (ISO week 2026-42).
pub fn default_clock() -> FixedClock {
    FixedClock::at(2026, 10, 14, 10, 0, 0)
}

pub fn create_test_app() -> TestApp {
    create_test_app_with(Config::test_default(), Arc::new(MemoryStore::new()))
}

/// Test app over an arbitrary store, e.g. one that injects failures.
pub fn create_test_app_with(config: Config, store: Arc<dyn DocumentStore>) -> TestApp {
    let clock = Arc::new(default_clock());
    let pushes = Arc::new(RecordingDispatcher::default());
    let codes = Arc::new(ScriptedCodes::default());

    let state = Arc::new(AppState::new(
        config,
        store,
        clock.clone(),
        pushes.clone(),
        codes.clone(),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        clock,
        pushes,
        codes,
    }
}

impl TestApp {
    /// Create a profile with a device token so pushes are recorded.
    pub async fn add_user(&self, id: &str, name: &str) {
        self.add_user_with_offset(id, name, 0).await;
    }

    pub async fn add_user_with_offset(&self, id: &str, name: &str, utc_offset_minutes: i32) {
        self.state
            .users
            .create_profile(
                id,
                NewProfile {
                    name: name.to_string(),
                    utc_offset_minutes: Some(utc_offset_minutes),
                    device_token: Some(format!("device-{id}")),
                    ..Default::default()
                },
            )
            .await
            .expect("create test profile");
    }

    pub fn token(&self, user_id: &str) -> String {
        create_jwt(user_id, &self.state.config.jwt_signing_key).expect("sign test jwt")
    }

    /// Send a request as `user_id`, with an optional JSON body.
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        user_id: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user_id {
            builder = builder.header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.token(user_id)),
            );
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
