use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use chrono::Utc;
use sea_orm::*;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::auth::DispatcherSession;
use crate::domain::{ProfileUpdate, Role, TripFilter};
use crate::error::ApiError;
use crate::infrastructure::AppState;
use crate::models::ProfileDto;
use crate::models::facility::Entity as Facility;
use crate::models::managed_client::{self, Entity as ManagedClient, ManagedClientDto};
use crate::services::account_service::{self, NewAccount};

#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

pub async fn list_clients(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let clients: Vec<ProfileDto> = state
        .profile_repo
        .list_by_role(Role::Client, query.status)
        .await?
        .into_iter()
        .map(ProfileDto::from)
        .collect();

    Ok(Json(json!({ "success": true, "clients": clients })))
}

/// Client profile plus their trip history
pub async fn get_client(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Value>, ApiError> {
    let client = account_service::find_with_role(&state, id, Role::Client, "Client").await?;
    let trips = state
        .trip_repo
        .find_all(TripFilter {
            user_id: Some(id),
            ..Default::default()
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "client": ProfileDto::from(client),
        "trips": trips
    })))
}

pub async fn create_client(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiJson(payload): ApiJson<NewAccount>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let created = account_service::create_account(&state, Role::Client, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "client": created.profile,
            "temporary_password": created.temporary_password
        })),
    ))
}

pub async fn update_client(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<ProfileUpdate>,
) -> Result<Json<Value>, ApiError> {
    account_service::find_with_role(&state, id, Role::Client, "Client").await?;
    let client = state.profile_repo.update(id, payload).await?;
    Ok(Json(json!({ "success": true, "client": ProfileDto::from(client) })))
}

pub async fn delete_client(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Value>, ApiError> {
    let client = account_service::deactivate_client(&state, id).await?;
    Ok(Json(json!({ "success": true, "client": client })))
}

// --- Managed clients (riders registered by a facility) ---

#[derive(Deserialize)]
pub struct ManagedClientQuery {
    pub facility_id: Option<i32>,
}

pub async fn list_managed_clients(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiQuery(query): ApiQuery<ManagedClientQuery>,
) -> Result<Json<Value>, ApiError> {
    let mut select = ManagedClient::find();
    if let Some(facility_id) = query.facility_id {
        select = select.filter(managed_client::Column::FacilityId.eq(facility_id));
    }
    let clients = select
        .order_by_asc(managed_client::Column::LastName)
        .order_by_asc(managed_client::Column::FirstName)
        .all(state.db())
        .await?;

    Ok(Json(json!({ "success": true, "managed_clients": clients })))
}

fn validate_names(dto: &ManagedClientDto) -> Result<(), ApiError> {
    if dto.first_name.trim().is_empty() || dto.last_name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "first_name and last_name are required".to_string(),
        ));
    }
    Ok(())
}

async fn ensure_facility(state: &AppState, facility_id: i32) -> Result<(), ApiError> {
    Facility::find_by_id(facility_id)
        .one(state.db())
        .await?
        .ok_or_else(|| ApiError::BadRequest(format!("Facility {} does not exist", facility_id)))?;
    Ok(())
}

pub async fn create_managed_client(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiJson(payload): ApiJson<ManagedClientDto>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    validate_names(&payload)?;
    ensure_facility(&state, payload.facility_id).await?;

    let now = Utc::now().to_rfc3339();
    let client = managed_client::ActiveModel {
        facility_id: Set(payload.facility_id),
        first_name: Set(payload.first_name.trim().to_string()),
        last_name: Set(payload.last_name.trim().to_string()),
        phone: Set(payload.phone),
        email: Set(payload.email),
        address: Set(payload.address),
        medical_notes: Set(payload.medical_notes),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(state.db())
    .await?;

    tracing::info!(
        "Managed client {} added to facility {}",
        client.id,
        client.facility_id
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "managed_client": client })),
    ))
}

pub async fn update_managed_client(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<ManagedClientDto>,
) -> Result<Json<Value>, ApiError> {
    validate_names(&payload)?;
    let existing = ManagedClient::find_by_id(id)
        .one(state.db())
        .await?
        .ok_or_else(|| ApiError::NotFound("Managed client not found".to_string()))?;
    if existing.facility_id != payload.facility_id {
        ensure_facility(&state, payload.facility_id).await?;
    }

    let mut active: managed_client::ActiveModel = existing.into();
    active.facility_id = Set(payload.facility_id);
    active.first_name = Set(payload.first_name.trim().to_string());
    active.last_name = Set(payload.last_name.trim().to_string());
    active.phone = Set(payload.phone);
    active.email = Set(payload.email);
    active.address = Set(payload.address);
    active.medical_notes = Set(payload.medical_notes);
    active.updated_at = Set(Utc::now().to_rfc3339());

    let client = active.update(state.db()).await?;
    Ok(Json(json!({ "success": true, "managed_client": client })))
}

pub async fn delete_managed_client(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Value>, ApiError> {
    let result = ManagedClient::delete_by_id(id).exec(state.db()).await?;
    if result.rows_affected == 0 {
        return Err(ApiError::NotFound("Managed client not found".to_string()));
    }
    Ok(Json(json!({ "success": true })))
}
