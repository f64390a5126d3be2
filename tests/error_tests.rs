// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use nutrigame::db::StoreError;
use nutrigame::error::AppError;

#[test]
fn test_status_codes() {
    let cases = [
        (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
        (AppError::NotFound("User u1".into()), StatusCode::NOT_FOUND),
        (AppError::BadRequest("nope".into()), StatusCode::BAD_REQUEST),
        (AppError::AlreadyCompleted, StatusCode::CONFLICT),
        (AppError::PhotoNotRequired, StatusCode::BAD_REQUEST),
        (AppError::InvalidSquadCode, StatusCode::BAD_REQUEST),
        (AppError::SquadNotFound, StatusCode::NOT_FOUND),
        (AppError::SquadFull, StatusCode::CONFLICT),
        (AppError::NotOwner, StatusCode::FORBIDDEN),
        (
            AppError::CodeGenerationFailed,
            StatusCode::SERVICE_UNAVAILABLE,
        ),
        (
            AppError::Contention("users/u1".into()),
            StatusCode::SERVICE_UNAVAILABLE,
        ),
        (
            AppError::Database("disk".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (err, status) in cases {
        let code = err.code();
        assert_eq!(err.into_response().status(), status, "{code}");
    }
}

#[test]
fn test_store_conflict_is_transient() {
    let err = AppError::from(StoreError::Conflict("squads/ABC123".into()));
    assert!(matches!(err, AppError::Contention(_)));
    assert!(err.is_transient());

    let err = AppError::from(StoreError::Backend("down".into()));
    assert!(matches!(err, AppError::Database(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_internal_details_are_not_leaked() {
    let err = AppError::Database("connection string with secrets".into());
    let response = err.into_response();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(body["error"], "database_error");
    assert!(body.get("details").is_none());
}
