//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no server is
//! involved.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use skinscan_api::error::AppError;
use skinscan_core::error::CoreError;
use skinscan_oracle::OracleError;

async fn error_to_response(err: AppError) -> (StatusCode, axum::http::HeaderMap, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "Achievement",
        id: "42".into(),
    });

    let (status, _, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Achievement with id 42 not found");
}

#[tokio::test]
async fn validation_error_returns_400() {
    let err = AppError::Core(CoreError::Validation("achievementName must not be blank".into()));

    let (status, _, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn unauthorized_error_returns_401() {
    let err = AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()));

    let (status, _, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
    assert_eq!(json["error"], "Invalid or expired token");
}

#[tokio::test]
async fn cooldown_returns_429_with_retry_after() {
    let next = Utc::now() + Duration::days(3);
    let err = AppError::Core(CoreError::RateLimited {
        error: "Cooldown active",
        message: "Next free scan in 3 days".into(),
        next_available_at: Some(next),
        retry_after_secs: Some(259_200),
    });

    let (status, headers, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(headers["retry-after"], "259200");
    assert_eq!(json["error"], "Cooldown active");
    assert_eq!(json["code"], "RATE_LIMIT_EXCEEDED");
    assert_eq!(json["message"], "Next free scan in 3 days");
    assert!(json["nextAvailableDate"].is_string());
}

#[tokio::test]
async fn exhausted_allowance_returns_429_without_retry_after() {
    let err = AppError::Core(CoreError::RateLimited {
        error: "No scans remaining",
        message: "You have used all your free scans.".into(),
        next_available_at: None,
        retry_after_secs: None,
    });

    let (status, headers, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(headers.get("retry-after").is_none());
    assert_eq!(json["error"], "No scans remaining");
    assert!(json.get("nextAvailableDate").is_none());
}

#[tokio::test]
async fn upstream_status_is_echoed_with_details() {
    let err = AppError::from(OracleError::Status {
        status: 503,
        body: "model warming up".into(),
    });

    let (status, _, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "UPSTREAM_ERROR");
    assert_eq!(json["details"], "model warming up");
}

#[tokio::test]
async fn upstream_invalid_json_returns_500() {
    let err = AppError::from(OracleError::InvalidJson {
        body: "<html>".into(),
    });

    let (status, _, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "UPSTREAM_ERROR");
}

#[tokio::test]
async fn payload_too_large_returns_413() {
    let (status, _, json) = error_to_response(AppError::PayloadTooLarge { limit: 1024 }).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn internal_error_returns_500_and_sanitizes_message() {
    let err = AppError::InternalError("webhook secret whsec_abc missing".into());

    let (status, _, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

#[tokio::test]
async fn row_not_found_maps_to_404() {
    let (status, _, json) = error_to_response(AppError::Database(sqlx::Error::RowNotFound)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}
