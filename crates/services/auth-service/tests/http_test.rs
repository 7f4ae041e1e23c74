//! HTTP surface tests using a stub lifecycle.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use auth_service_lib::http::{create_router, AppState};
use auth_service_lib::service::{PurgeFailure, PurgeReport, UserLifecycle};
use common::{AppError, AppResult, NotifyError};
use domain::{DormantUser, Registration, User};

// =============================================================================
// Stub lifecycle
// =============================================================================

/// Answers by username: "taken" is a duplicate, "ghost" does not exist,
/// "offline" fails to propagate.
struct StubLifecycle;

#[async_trait]
impl UserLifecycle for StubLifecycle {
    async fn register(&self, registration: Registration) -> AppResult<User> {
        match registration.username.as_str() {
            "taken" => Err(AppError::duplicate_username("taken")),
            "offline" => Err(AppError::RegistrationPropagationFailed {
                user_id: 12,
                source: NotifyError::no_instances("AccountServer"),
            }),
            _ => Ok(User {
                id: 11,
                username: registration.username,
                password_hash: "hashed".to_string(),
                created_at: Utc::now(),
            }),
        }
    }

    async fn transition_to_dormant(&self, username: &str) -> AppResult<DormantUser> {
        match username {
            "ghost" => Err(AppError::user_not_found("ghost")),
            "offline" => Err(AppError::DormancyPropagationFailed {
                user_id: 13,
                source: NotifyError::transport("connection refused"),
            }),
            _ => Ok(DormantUser {
                id: 14,
                username: username.to_string(),
                password_hash: "hashed".to_string(),
                dormant_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            }),
        }
    }

    async fn purge_expired(&self) -> AppResult<PurgeReport> {
        Ok(PurgeReport {
            scanned: 2,
            purged: vec![3],
            failures: vec![PurgeFailure {
                id: 4,
                username: "stuck".to_string(),
                error: "Database error".to_string(),
            }],
        })
    }
}

fn app() -> Router {
    create_router(AppState::new(Arc::new(StubLifecycle), None))
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn register_body(username: &str) -> Value {
    json!({
        "username": username,
        "password": "sort-the-cans",
        "name": "Choi Yuna",
        "postalCode": "61452",
        "roadNameAddress": "7 Geumnam-ro",
        "detailedAddress": "",
        "email": "yuna@example.com",
        "phoneNumber": "010-2222-3333"
    })
}

// =============================================================================
// Register
// =============================================================================

#[tokio::test]
async fn test_register_returns_created() {
    let (status, body) = send(post_json("/api/auth/register", register_body("yuna"))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({ "id": 11, "username": "yuna" }));
}

#[tokio::test]
async fn test_register_rejects_invalid_email() {
    let mut payload = register_body("yuna");
    payload["email"] = json!("not-an-email");

    let (status, body) = send(post_json("/api/auth/register", payload)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["message"], "Invalid email format");
}

#[tokio::test]
async fn test_register_rejects_missing_field() {
    let mut payload = register_body("yuna");
    payload.as_object_mut().unwrap().remove("postalCode");

    let (status, _) = send(post_json("/api/auth/register", payload)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_reports_every_violation_in_field_order() {
    let mut payload = register_body("yuna");
    payload["email"] = json!("not-an-email");
    payload["password"] = json!("short");

    let (status, body) = send(post_json("/api/auth/register", payload)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "Invalid email format; Password must be at least 8 characters"
    );
}

#[tokio::test]
async fn test_register_without_json_content_type_is_bad_request() {
    let (status, body) = send(post_empty("/api/auth/register")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "Expected a request body with content type application/json"
    );
}

#[tokio::test]
async fn test_register_duplicate_is_conflict() {
    let (status, body) = send(post_json("/api/auth/register", register_body("taken"))).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_register_propagation_failure_is_generic() {
    let (status, body) = send(post_json("/api/auth/register", register_body("offline"))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({
            "error": {
                "code": "REQUEST_FAILED",
                "message": "The request could not be completed"
            }
        })
    );
}

// =============================================================================
// Dormancy and purge
// =============================================================================

#[tokio::test]
async fn test_dormant_transition_returns_record() {
    let (status, body) = send(post_empty("/api/auth/users/yuna/dormant")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "id": 14, "username": "yuna", "dormantDate": "2024-06-01" })
    );
}

#[tokio::test]
async fn test_dormant_transition_unknown_user_is_not_found() {
    let (status, body) = send(post_empty("/api/auth/users/ghost/dormant")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_dormant_propagation_failure_matches_registration_failure() {
    let (status, body) = send(post_empty("/api/auth/users/offline/dormant")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["message"], "The request could not be completed");
}

#[tokio::test]
async fn test_purge_reports_outcome() {
    let (status, body) = send(post_empty("/api/auth/dormant/purge")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scanned"], 2);
    assert_eq!(body["purged"], json!([3]));
    assert_eq!(body["failed"][0]["username"], "stuck");
}

#[tokio::test]
async fn test_health_without_database() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "healthy" }));
}
