//! Account lifecycle handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use common::AppResult;
use domain::{Profile, Registration, UserId};

use crate::http::{AppState, ValidatedJson};
use crate::service::PurgeFailure;

/// Registration request with validation
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 50, message = "Username must be 1 to 50 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Postal code is required"))]
    pub postal_code: String,
    #[validate(length(min = 1, message = "Road name address is required"))]
    pub road_name_address: String,
    #[serde(default)]
    pub detailed_address: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Phone number is required"))]
    pub phone_number: String,
}

impl From<RegisterRequest> for Registration {
    fn from(request: RegisterRequest) -> Self {
        Registration {
            username: request.username,
            password: request.password,
            profile: Profile {
                name: request.name,
                postal_code: request.postal_code,
                road_name_address: request.road_name_address,
                detailed_address: request.detailed_address,
                email: request.email,
                phone_number: request.phone_number,
            },
        }
    }
}

/// Newly registered user
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisteredResponse {
    pub id: UserId,
    pub username: String,
}

/// Account moved into dormancy
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DormantResponse {
    pub id: UserId,
    pub username: String,
    pub dormant_date: NaiveDate,
}

/// Summary of an on-demand purge
#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub scanned: usize,
    pub purged: Vec<UserId>,
    pub failed: Vec<PurgeFailure>,
}

/// Create lifecycle routes
pub fn lifecycle_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/users/:username/dormant", post(transition_to_dormant))
        .route("/dormant/purge", post(purge_dormant))
}

/// Register a new user and announce it to the Account service
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisteredResponse>)> {
    let user = state.lifecycle.register(payload.into()).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisteredResponse {
            id: user.id,
            username: user.username,
        }),
    ))
}

/// Move an active user into dormancy
pub async fn transition_to_dormant(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Json<DormantResponse>> {
    let dormant = state.lifecycle.transition_to_dormant(&username).await?;

    Ok(Json(DormantResponse {
        id: dormant.id,
        username: dormant.username,
        dormant_date: dormant.dormant_date,
    }))
}

/// Purge expired dormant accounts now
pub async fn purge_dormant(State(state): State<AppState>) -> AppResult<Json<PurgeResponse>> {
    let report = state.lifecycle.purge_expired().await?;

    Ok(Json(PurgeResponse {
        scanned: report.scanned,
        purged: report.purged,
        failed: report.failures,
    }))
}
