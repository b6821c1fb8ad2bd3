use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::auth::DispatcherSession;
use crate::domain::{NewTrip, TripAction, TripFilter, TripUpdate};
use crate::error::ApiError;
use crate::infrastructure::AppState;
use crate::services::trip_service::{self, ActionResult};

/// Trips matching the query, newest pickup first, with rider/driver/facility names
pub async fn list_trips(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiQuery(filter): ApiQuery<TripFilter>,
) -> Result<Json<Value>, ApiError> {
    let trips = state.trip_repo.find_all(filter).await?;
    Ok(Json(json!({
        "success": true,
        "total": trips.len(),
        "trips": trips
    })))
}

pub async fn get_trip(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Value>, ApiError> {
    let trip = state
        .trip_repo
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Trip not found".to_string()))?;
    Ok(Json(json!({ "success": true, "trip": trip })))
}

pub async fn create_trip(
    State(state): State<AppState>,
    session: DispatcherSession,
    ApiJson(payload): ApiJson<NewTrip>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let trip = trip_service::create_trip(&state, payload).await?;
    tracing::debug!("Trip {} created by dispatcher {}", trip.id, session.profile_id());
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "trip": trip })),
    ))
}

pub async fn update_trip(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<TripUpdate>,
) -> Result<Json<Value>, ApiError> {
    let trip = trip_service::update_trip(&state, id, payload).await?;
    Ok(Json(json!({ "success": true, "trip": trip })))
}

pub async fn delete_trip(
    State(state): State<AppState>,
    session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Value>, ApiError> {
    state.trip_repo.delete(id).await?;
    tracing::info!("Trip {} deleted by dispatcher {}", id, session.profile_id());
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct AssignDriverRequest {
    driver_id: i32,
}

pub async fn assign_driver(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<AssignDriverRequest>,
) -> Result<Json<Value>, ApiError> {
    let trip = trip_service::assign_driver(&state, id, payload.driver_id).await?;
    Ok(Json(json!({ "success": true, "trip": trip })))
}

#[derive(Deserialize)]
pub struct TripActionRequest {
    #[serde(alias = "tripId")]
    trip_id: i32,
    action: String,
    reason: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct ReasonBody {
    reason: Option<String>,
}

fn action_response(result: ActionResult) -> Json<Value> {
    let message = match (&result.payment, result.trip.status.as_str()) {
        (Some(p), _) => p.message.clone(),
        (None, "upcoming") => "Trip approved".to_string(),
        (None, "cancelled") => "Trip rejected".to_string(),
        (None, "completed") => "Trip completed".to_string(),
        (None, status) => format!("Trip is now {}", status),
    };
    Json(json!({
        "success": true,
        "message": message,
        "trip": result.trip,
        "payment": result.payment
    }))
}

#[utoipa::path(
    post,
    path = "/api/trips/actions",
    responses(
        (status = 200, description = "Action applied; payment.fallback is true when the charge failed"),
        (status = 400, description = "Unknown action, missing reason or status does not allow the action"),
        (status = 401, description = "Missing or invalid session"),
        (status = 403, description = "Dispatcher role required"),
        (status = 404, description = "Trip not found")
    )
)]
pub async fn trip_action(
    State(state): State<AppState>,
    session: DispatcherSession,
    ApiJson(payload): ApiJson<TripActionRequest>,
) -> Result<Json<Value>, ApiError> {
    let action: TripAction = payload.action.parse()?;
    tracing::info!(
        "Dispatcher {} requested {} on trip {}",
        session.profile_id(),
        action.as_str(),
        payload.trip_id
    );
    let result =
        trip_service::apply_action(&state, payload.trip_id, action, payload.reason).await?;
    Ok(action_response(result))
}

pub async fn approve_trip(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Value>, ApiError> {
    let result = trip_service::apply_action(&state, id, TripAction::Approve, None).await?;
    Ok(action_response(result))
}

pub async fn reject_trip(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
    body: Option<Json<ReasonBody>>,
) -> Result<Json<Value>, ApiError> {
    let reason = body.and_then(|Json(b)| b.reason);
    let result = trip_service::apply_action(&state, id, TripAction::Reject, reason).await?;
    Ok(action_response(result))
}

pub async fn complete_trip(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Value>, ApiError> {
    let result = trip_service::apply_action(&state, id, TripAction::Complete, None).await?;
    Ok(action_response(result))
}
