//! Integration tests for `/api/v1/achievements`.

mod common;

use axum::http::StatusCode;
use common::{body_json, get_with_token, post_json_with_token, TestApp, UNUSED_ORACLE_URL};
use serde_json::json;
use uuid::Uuid;

const ACHIEVEMENTS: &str = "/api/v1/achievements";

fn first_scan() -> serde_json::Value {
    json!({
        "achievementType": "milestone",
        "achievementName": "First Scan",
        "achievementDescription": "Completed your first skin scan",
    })
}

#[tokio::test]
async fn award_then_repeat() {
    let app = TestApp::with_oracle(UNUSED_ORACLE_URL);
    let token = app.token(Uuid::new_v4(), None);

    let response = app
        .send(post_json_with_token(ACHIEVEMENTS, &token, first_scan()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Achievement unlocked: First Scan");
    assert_eq!(json["achievement"]["achievementName"], "First Scan");
    assert_eq!(json["achievement"]["progress"], 100);
    assert!(json.get("alreadyUnlocked").is_none());

    let response = app
        .send(post_json_with_token(ACHIEVEMENTS, &token, first_scan()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["alreadyUnlocked"], true);
    assert_eq!(json["message"], "Achievement already unlocked");
    assert!(json.get("achievement").is_none());
}

#[tokio::test]
async fn same_achievement_for_different_users() {
    let app = TestApp::with_oracle(UNUSED_ORACLE_URL);

    for _ in 0..2 {
        let token = app.token(Uuid::new_v4(), None);
        let json = body_json(
            app.send(post_json_with_token(ACHIEVEMENTS, &token, first_scan()))
                .await,
        )
        .await;
        assert_eq!(json["success"], true);
    }
}

#[tokio::test]
async fn list_returns_only_own_achievements() {
    let app = TestApp::with_oracle(UNUSED_ORACLE_URL);
    let user = Uuid::new_v4();
    let token = app.token(user, None);
    let other = app.token(Uuid::new_v4(), None);

    app.send(post_json_with_token(ACHIEVEMENTS, &token, first_scan()))
        .await;
    app.send(post_json_with_token(
        ACHIEVEMENTS,
        &token,
        json!({
            "achievementType": "streak",
            "achievementName": "Four Weeks",
            "achievementDescription": "Scanned four weeks in a row",
        }),
    ))
    .await;
    app.send(post_json_with_token(ACHIEVEMENTS, &other, first_scan()))
        .await;

    let response = app.send(get_with_token(ACHIEVEMENTS, &token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert!(data.iter().all(|a| a["userId"] == user.to_string()));
}

#[tokio::test]
async fn blank_name_returns_400() {
    let app = TestApp::with_oracle(UNUSED_ORACLE_URL);
    let token = app.token(Uuid::new_v4(), None);

    let mut body = first_scan();
    body["achievementName"] = json!("   ");
    let response = app.send(post_json_with_token(ACHIEVEMENTS, &token, body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn missing_field_is_rejected() {
    let app = TestApp::with_oracle(UNUSED_ORACLE_URL);
    let token = app.token(Uuid::new_v4(), None);

    let response = app
        .send(post_json_with_token(
            ACHIEVEMENTS,
            &token,
            json!({ "achievementType": "milestone" }),
        ))
        .await;

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn achievements_require_a_token() {
    let app = TestApp::with_oracle(UNUSED_ORACLE_URL);

    let response = app
        .send(post_json_with_token(ACHIEVEMENTS, "garbage", first_scan()))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
