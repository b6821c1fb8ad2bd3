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
use crate::domain::{Role, TripFilter};
use crate::error::ApiError;
use crate::infrastructure::AppState;
use crate::models::ProfileDto;
use crate::models::facility::{self, Entity as Facility, FacilityDto};
use crate::models::managed_client::{self, Entity as ManagedClient};
use crate::models::profile::{self, Entity as Profile};
use crate::services::account_service::{self, NewAccount};

const RECENT_TRIPS: u64 = 20;

#[derive(Deserialize)]
pub struct ListQuery {
    /// Include deactivated facilities
    #[serde(default)]
    pub include_inactive: bool,
}

pub async fn list_facilities(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let mut select = Facility::find();
    if !query.include_inactive {
        select = select.filter(facility::Column::IsActive.eq(true));
    }
    let facilities = select
        .order_by_asc(facility::Column::Name)
        .all(state.db())
        .await?;

    Ok(Json(json!({ "success": true, "facilities": facilities })))
}

async fn find_facility(state: &AppState, id: i32) -> Result<facility::Model, ApiError> {
    Facility::find_by_id(id)
        .one(state.db())
        .await?
        .ok_or_else(|| ApiError::NotFound("Facility not found".to_string()))
}

pub async fn get_facility(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Value>, ApiError> {
    let facility = find_facility(&state, id).await?;

    let managed_client_count = ManagedClient::find()
        .filter(managed_client::Column::FacilityId.eq(id))
        .count(state.db())
        .await?;

    let staff: Vec<ProfileDto> = Profile::find()
        .filter(profile::Column::FacilityId.eq(id))
        .filter(profile::Column::Role.eq(Role::Facility.as_str()))
        .all(state.db())
        .await?
        .into_iter()
        .map(ProfileDto::from)
        .collect();

    let recent_trips = state
        .trip_repo
        .find_all(TripFilter {
            facility_id: Some(id),
            limit: Some(RECENT_TRIPS),
            ..Default::default()
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "facility": facility,
        "managed_client_count": managed_client_count,
        "staff": staff,
        "recent_trips": recent_trips
    })))
}

fn validate(dto: &FacilityDto) -> Result<(), ApiError> {
    if dto.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Facility name is required".to_string()));
    }
    Ok(())
}

pub async fn create_facility(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiJson(payload): ApiJson<FacilityDto>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    validate(&payload)?;
    let now = Utc::now().to_rfc3339();

    let facility = facility::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        address: Set(payload.address),
        phone: Set(payload.phone),
        email: Set(payload.email),
        billing_email: Set(payload.billing_email),
        contact_name: Set(payload.contact_name),
        is_active: Set(payload.is_active),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(state.db())
    .await?;

    tracing::info!("Facility {} created: {}", facility.id, facility.name);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "facility": facility })),
    ))
}

pub async fn update_facility(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<FacilityDto>,
) -> Result<Json<Value>, ApiError> {
    validate(&payload)?;
    let existing = find_facility(&state, id).await?;

    let mut active: facility::ActiveModel = existing.into();
    active.name = Set(payload.name.trim().to_string());
    active.address = Set(payload.address);
    active.phone = Set(payload.phone);
    active.email = Set(payload.email);
    active.billing_email = Set(payload.billing_email);
    active.contact_name = Set(payload.contact_name);
    active.is_active = Set(payload.is_active);
    active.updated_at = Set(Utc::now().to_rfc3339());

    let facility = active.update(state.db()).await?;
    Ok(Json(json!({ "success": true, "facility": facility })))
}

/// Soft delete: the facility keeps its trips and invoices
pub async fn delete_facility(
    State(state): State<AppState>,
    session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Value>, ApiError> {
    let existing = find_facility(&state, id).await?;

    let mut active: facility::ActiveModel = existing.into();
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now().to_rfc3339());
    let facility = active.update(state.db()).await?;

    tracing::info!(
        "Facility {} deactivated by dispatcher {}",
        id,
        session.profile_id()
    );
    Ok(Json(json!({ "success": true, "facility": facility })))
}

/// Create a login for a facility's staff
pub async fn create_facility_user(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
    ApiJson(mut payload): ApiJson<NewAccount>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    payload.facility_id = Some(id);
    let created = account_service::create_account(&state, Role::Facility, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "user": created.profile,
            "temporary_password": created.temporary_password
        })),
    ))
}
