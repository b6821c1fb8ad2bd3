use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::auth::DispatcherSession;
use crate::domain::{ProfileUpdate, Role, TripFilter};
use crate::error::ApiError;
use crate::infrastructure::AppState;
use crate::models::ProfileDto;
use crate::services::account_service::{self, NewAccount};

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

pub async fn list_drivers(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let drivers: Vec<ProfileDto> = state
        .profile_repo
        .list_by_role(Role::Driver, query.status)
        .await?
        .into_iter()
        .map(ProfileDto::from)
        .collect();

    Ok(Json(json!({ "success": true, "drivers": drivers })))
}

/// Driver profile plus the open trips assigned to them
pub async fn get_driver(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Value>, ApiError> {
    let driver = account_service::find_with_role(&state, id, Role::Driver, "Driver").await?;

    let mut trips = state
        .trip_repo
        .find_all(TripFilter {
            driver_id: Some(id),
            status: Some("upcoming,approved_pending_payment,paid_in_progress".to_string()),
            ..Default::default()
        })
        .await?;
    // Soonest first for the driver's schedule
    trips.reverse();

    Ok(Json(json!({
        "success": true,
        "driver": ProfileDto::from(driver),
        "assigned_trips": trips
    })))
}

pub async fn create_driver(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiJson(payload): ApiJson<NewAccount>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let created = account_service::create_account(&state, Role::Driver, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "driver": created.profile,
            "temporary_password": created.temporary_password
        })),
    ))
}

pub async fn update_driver(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<ProfileUpdate>,
) -> Result<Json<Value>, ApiError> {
    let driver = account_service::update_driver(&state, id, payload).await?;
    Ok(Json(json!({ "success": true, "driver": driver })))
}

pub async fn delete_driver(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Value>, ApiError> {
    let driver = account_service::deactivate_driver(&state, id).await?;
    Ok(Json(json!({ "success": true, "driver": driver })))
}
