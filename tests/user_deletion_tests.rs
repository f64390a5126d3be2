// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Integration tests for account deletion.

use chrono::Duration;
use futures_util::FutureExt;
use nutrigame::db::DocPath;
use nutrigame::error::AppError;
use nutrigame::models::MissionType;

mod common;

const PHOTO: &str = "https://cdn.example.com/meal.jpg";

#[tokio::test]
async fn test_delete_account_removes_all_records() {
    let app = common::create_test_app();
    app.add_user("u1", "Ana").await;
    app.add_user("u2", "Bruno").await;

    app.codes.push(&["AAAAAA"]);
    app.state.squads.create_squad("Greens", "u1").await.unwrap();
    app.state.squads.join_squad("u2", "AAAAAA").await.unwrap();

    // 1. Activity in two different weeks
    let missions = &app.state.missions;
    missions
        .complete_mission("u2", MissionType::Breakfast, PHOTO)
        .await
        .unwrap();
    missions.update_hydration("u2", 3).await.unwrap();
    missions
        .complete_mission("u1", MissionType::Breakfast, PHOTO)
        .await
        .unwrap();
    let week_one = app.state.ranking.current_ranking_id("AAAAAA");

    app.clock.advance(Duration::days(7));
    missions
        .complete_mission("u2", MissionType::Dinner, PHOTO)
        .await
        .unwrap();
    let week_two = app.state.ranking.current_ranking_id("AAAAAA");

    // 2. Delete
    let deleted = app.state.users.delete_account("u2").await.unwrap();
    // 2 entries + 3 missions + profile
    assert_eq!(deleted, 6);

    // 3. Verify
    assert!(app.state.db.get_user("u2").await.unwrap().is_none());
    assert!(app
        .state
        .db
        .get_missions_for_user("u2")
        .await
        .unwrap()
        .is_empty());
    for ranking_id in [&week_one, &week_two] {
        assert!(app
            .state
            .db
            .get_ranking_entry(ranking_id, "u2")
            .await
            .unwrap()
            .is_none());
    }

    let squad = app.state.db.get_squad("AAAAAA").await.unwrap().unwrap();
    assert_eq!(squad.member_count, 1);

    // Other members are untouched.
    assert!(app
        .state
        .db
        .get_ranking_entry(&week_one, "u1")
        .await
        .unwrap()
        .is_some());
    assert_eq!(app.state.db.get_missions_for_user("u1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_account_without_squad() {
    let app = common::create_test_app();
    app.add_user("solo", "Solo").await;
    app.state
        .missions
        .complete_mission("solo", MissionType::Snack, PHOTO)
        .await
        .unwrap();

    assert_eq!(app.state.users.delete_account("solo").await.unwrap(), 2);
    assert!(app.state.db.get_user("solo").await.unwrap().is_none());
}

#[tokio::test]
async fn test_owner_deletion_keeps_squad() {
    let app = common::create_test_app();
    app.add_user("u1", "Ana").await;
    app.add_user("u2", "Bruno").await;
    app.codes.push(&["AAAAAA"]);
    app.state.squads.create_squad("Greens", "u1").await.unwrap();
    app.state.squads.join_squad("u2", "AAAAAA").await.unwrap();

    app.state.users.delete_account("u1").await.unwrap();

    let squad = app.state.db.get_squad("AAAAAA").await.unwrap().unwrap();
    assert_eq!(squad.member_count, 1);
    assert_eq!(squad.owner_user_id, "u1");
}

#[tokio::test]
async fn test_delete_unknown_account() {
    let app = common::create_test_app();
    let err = app.state.users.delete_account("ghost").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_join_during_account_deletion_keeps_counts() {
    let app = common::create_interleaved_app(DocPath::new("users", "u2"), |state| {
        async move {
            state.squads.join_squad("u2", "BBBBBB").await.unwrap();
        }
        .boxed()
    });
    app.add_user("u1", "Ana").await;
    app.add_user("u2", "Bruno").await;
    app.add_user("u3", "Carla").await;
    app.codes.push(&["AAAAAA", "BBBBBB"]);
    app.state.squads.create_squad("Greens", "u1").await.unwrap();
    app.state.squads.create_squad("Blues", "u3").await.unwrap();
    app.state.squads.join_squad("u2", "AAAAAA").await.unwrap();

    app.state.users.delete_account("u2").await.unwrap();

    assert!(app.state.db.get_user("u2").await.unwrap().is_none());
    for code in ["AAAAAA", "BBBBBB"] {
        let squad = app.state.db.get_squad(code).await.unwrap().unwrap();
        assert_eq!(squad.member_count, 1, "squad {code}");
    }
}

#[tokio::test]
async fn test_mission_during_account_deletion_leaves_nothing_behind() {
    let app = common::create_interleaved_app(DocPath::new("users", "u2"), |state| {
        async move {
            state
                .missions
                .complete_mission("u2", MissionType::Lunch, PHOTO)
                .await
                .unwrap();
        }
        .boxed()
    });
    app.add_user("u1", "Ana").await;
    app.add_user("u2", "Bruno").await;
    app.codes.push(&["AAAAAA"]);
    app.state.squads.create_squad("Greens", "u1").await.unwrap();
    app.state.squads.join_squad("u2", "AAAAAA").await.unwrap();
    let ranking_id = app.state.ranking.current_ranking_id("AAAAAA");

    // profile + the racing mission + its ranking entry
    assert_eq!(app.state.users.delete_account("u2").await.unwrap(), 3);

    assert!(app.state.db.get_user("u2").await.unwrap().is_none());
    assert!(app
        .state
        .db
        .get_missions_for_user("u2")
        .await
        .unwrap()
        .is_empty());
    assert!(app
        .state
        .db
        .get_ranking_entry(&ranking_id, "u2")
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        app.state.db.get_squad("AAAAAA").await.unwrap().unwrap().member_count,
        1
    );
}
