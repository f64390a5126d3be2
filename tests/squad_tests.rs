// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Squad registry tests: creation, membership counts, capacity and deletion.

use futures_util::FutureExt;
use nutrigame::config::Config;
use nutrigame::db::{DocPath, MemoryStore, Write};
use nutrigame::error::AppError;
use serde_json::json;
use std::sync::{Arc, Mutex};

mod common;

async fn member_count(app: &common::TestApp, code: &str) -> u32 {
    app.state
        .db
        .get_squad(code)
        .await
        .unwrap()
        .map(|s| s.member_count)
        .unwrap_or(0)
}

async fn squad_of(app: &common::TestApp, user_id: &str) -> Option<String> {
    app.state
        .db
        .get_user(user_id)
        .await
        .unwrap()
        .unwrap()
        .squad_code
}

/// App whose squads hold at most `max_members`.
fn app_with_capacity(max_members: u32) -> common::TestApp {
    let config = Config {
        squad_max_members: max_members,
        ..Config::test_default()
    };
    common::create_test_app_with(config, Arc::new(MemoryStore::new()))
}

#[tokio::test]
async fn test_create_squad_makes_owner_a_coach_member() {
    let app = common::create_test_app();
    app.add_user("u1", "Ana").await;

    let squad = app
        .state
        .squads
        .create_squad("  Green Team  ", "u1")
        .await
        .unwrap();
    assert_eq!(squad.name, "Green Team");
    assert_eq!(squad.owner_user_id, "u1");
    assert_eq!(squad.member_count, 1);
    assert_eq!(squad.max_members, 100);
    assert_eq!(squad.code.len(), 6);

    let owner = app.state.db.get_user("u1").await.unwrap().unwrap();
    assert_eq!(owner.squad_code.as_deref(), Some(squad.code.as_str()));
    assert!(owner.is_coach);
}

#[tokio::test]
async fn test_create_squad_rejects_bad_names() {
    let app = common::create_test_app();
    app.add_user("u1", "Ana").await;

    let too_long = "x".repeat(51);
    for name in ["", " A ", too_long.as_str()] {
        let err = app.state.squads.create_squad(name, "u1").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)), "{name:?}");
    }
}

#[tokio::test]
async fn test_code_collision_tries_next_code() {
    let app = common::create_test_app();
    app.add_user("u1", "Ana").await;
    app.add_user("u2", "Bruno").await;

    app.codes.push(&["AAAAAA", "AAAAAA", "BBBBBB"]);
    let first = app.state.squads.create_squad("First", "u1").await.unwrap();
    let second = app.state.squads.create_squad("Second", "u2").await.unwrap();

    assert_eq!(first.code, "AAAAAA");
    assert_eq!(second.code, "BBBBBB");
}

#[tokio::test]
async fn test_code_generation_gives_up() {
    let app = common::create_test_app();
    app.add_user("u1", "Ana").await;
    app.add_user("u2", "Bruno").await;

    app.codes.push(&["AAAAAA"]);
    app.state.squads.create_squad("First", "u1").await.unwrap();

    app.codes.push(&["AAAAAA"; 10]);
    let err = app
        .state
        .squads
        .create_squad("Second", "u2")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CodeGenerationFailed));
    assert!(squad_of(&app, "u2").await.is_none());
}

#[tokio::test]
async fn test_join_normalizes_code_and_counts_members() {
    let app = common::create_test_app();
    app.add_user("u1", "Ana").await;
    app.add_user("u2", "Bruno").await;

    app.codes.push(&["ABC123"]);
    app.state.squads.create_squad("Greens", "u1").await.unwrap();

    let squad = app.state.squads.join_squad("u2", " abc123 ").await.unwrap();
    assert_eq!(squad.member_count, 2);
    assert_eq!(member_count(&app, "ABC123").await, 2);
    assert_eq!(squad_of(&app, "u2").await.as_deref(), Some("ABC123"));

    // Joining again changes nothing.
    let again = app.state.squads.join_squad("u2", "ABC123").await.unwrap();
    assert_eq!(again.member_count, 2);
    assert_eq!(member_count(&app, "ABC123").await, 2);
}

#[tokio::test]
async fn test_join_errors() {
    let app = common::create_test_app();
    app.add_user("u1", "Ana").await;

    let err = app.state.squads.join_squad("u1", "abc").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidSquadCode));

    let err = app.state.squads.join_squad("u1", "ZZZZZZ").await.unwrap_err();
    assert!(matches!(err, AppError::SquadNotFound));
}

#[tokio::test]
async fn test_full_squad_rejects_join() {
    let app = app_with_capacity(2);
    app.add_user("u1", "Ana").await;
    app.add_user("u2", "Bruno").await;
    app.add_user("u3", "Carla").await;

    let squad = app.state.squads.create_squad("Tiny", "u1").await.unwrap();
    app.state.squads.join_squad("u2", &squad.code).await.unwrap();

    let err = app
        .state
        .squads
        .join_squad("u3", &squad.code)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::SquadFull));
    assert_eq!(member_count(&app, &squad.code).await, 2);
    assert!(squad_of(&app, "u3").await.is_none());
}

#[tokio::test]
async fn test_switching_squads_moves_the_count() {
    let app = common::create_test_app();
    app.add_user("u1", "Ana").await;
    app.add_user("u2", "Bruno").await;
    app.add_user("u3", "Carla").await;

    let a = app.state.squads.create_squad("Alpha", "u1").await.unwrap();
    let b = app.state.squads.create_squad("Beta", "u2").await.unwrap();

    app.state.squads.join_squad("u3", &a.code).await.unwrap();
    assert_eq!(member_count(&app, &a.code).await, 2);

    app.state.squads.join_squad("u3", &b.code).await.unwrap();
    assert_eq!(member_count(&app, &a.code).await, 1);
    assert_eq!(member_count(&app, &b.code).await, 2);

    let left = app.state.squads.leave_squad("u3").await.unwrap();
    assert_eq!(left.as_deref(), Some(b.code.as_str()));
    assert_eq!(member_count(&app, &b.code).await, 1);

    // Leaving without a squad is a no-op.
    assert!(app.state.squads.leave_squad("u3").await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_never_overfill() {
    let app = app_with_capacity(4);
    app.add_user("owner", "Owner").await;
    let squad = app.state.squads.create_squad("Race", "owner").await.unwrap();

    let joiners: Vec<String> = (0..6).map(|i| format!("j{i}")).collect();
    for id in &joiners {
        app.add_user(id, "Joiner").await;
    }

    let mut handles = Vec::new();
    for id in joiners.clone() {
        let squads = app.state.squads.clone();
        let code = squad.code.clone();
        handles.push(tokio::spawn(
            async move { squads.join_squad(&id, &code).await },
        ));
    }

    let mut joined = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => joined += 1,
            Err(AppError::SquadFull) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(joined, 3);
    assert_eq!(member_count(&app, &squad.code).await, 4);

    let mut members = 0;
    for id in &joiners {
        if squad_of(&app, id).await.as_deref() == Some(squad.code.as_str()) {
            members += 1;
        }
    }
    assert_eq!(members, 3);
}

#[tokio::test]
async fn test_delete_squad_owner_only() {
    let app = common::create_test_app();
    app.add_user("u1", "Ana").await;
    app.add_user("u2", "Bruno").await;

    let squad = app.state.squads.create_squad("Greens", "u1").await.unwrap();
    app.state.squads.join_squad("u2", &squad.code).await.unwrap();

    let err = app
        .state
        .squads
        .delete_squad(&squad.code, "u2")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotOwner));

    let removed = app
        .state
        .squads
        .delete_squad(&squad.code, "u1")
        .await
        .unwrap();
    assert_eq!(removed, 2);

    assert!(app.state.db.get_squad(&squad.code).await.unwrap().is_none());
    assert!(squad_of(&app, "u1").await.is_none());
    assert!(squad_of(&app, "u2").await.is_none());

    let err = app.state.squads.get_squad(&squad.code).await.unwrap_err();
    assert!(matches!(err, AppError::SquadNotFound));
}

#[tokio::test]
async fn test_join_during_squad_delete_is_refused() {
    let joined = Arc::new(Mutex::new(None));
    let outcome = joined.clone();
    let app = common::create_interleaved_app(DocPath::new("squads", "AAAAAA"), move |state| {
        async move {
            let result = state.squads.join_squad("u3", "AAAAAA").await;
            *outcome.lock().unwrap() = Some(result.map(|squad| squad.code));
        }
        .boxed()
    });
    app.add_user("u1", "Ana").await;
    app.add_user("u2", "Bruno").await;
    app.add_user("u3", "Carla").await;
    app.codes.push(&["AAAAAA"]);
    app.state.squads.create_squad("Greens", "u1").await.unwrap();
    app.state.squads.join_squad("u2", "AAAAAA").await.unwrap();

    let removed = app
        .state
        .squads
        .delete_squad("AAAAAA", "u1")
        .await
        .unwrap();
    assert_eq!(removed, 2);

    let outcome = joined.lock().unwrap().take();
    assert!(matches!(outcome, Some(Err(AppError::SquadNotFound))));
    assert!(app.state.db.get_squad("AAAAAA").await.unwrap().is_none());
    assert!(squad_of(&app, "u3").await.is_none());
}

#[tokio::test]
async fn test_squad_marked_for_deletion_refuses_joins() {
    let app = common::create_test_app();
    app.add_user("u1", "Ana").await;
    app.add_user("u2", "Bruno").await;
    app.codes.push(&["AAAAAA"]);
    app.state.squads.create_squad("Greens", "u1").await.unwrap();

    // A delete that stopped after marking the squad.
    app.state
        .db
        .commit(vec![Write::merge(
            DocPath::new("squads", "AAAAAA"),
            json!({ "deleting": true }),
        )])
        .await
        .unwrap();

    let err = app.state.squads.join_squad("u2", "AAAAAA").await.unwrap_err();
    assert!(matches!(err, AppError::SquadNotFound));
    assert!(matches!(
        app.state.squads.get_squad("AAAAAA").await,
        Err(AppError::SquadNotFound)
    ));

    // The owner can finish the delete.
    assert_eq!(app.state.squads.delete_squad("AAAAAA", "u1").await.unwrap(), 1);
    assert!(app.state.db.get_squad("AAAAAA").await.unwrap().is_none());
    assert_eq!(member_count(&app, "AAAAAA").await, 0);
}
