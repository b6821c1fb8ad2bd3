use axum::{
    Json,
    extract::State,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::extract::{ApiJson, ApiPath};
use crate::auth::Session;
use crate::error::ApiError;
use crate::infrastructure::AppState;
use crate::services::notification_service;

pub async fn list_notifications(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    let list = notification_service::list_for_user(state.db(), session.profile_id()).await?;
    Ok(Json(json!({
        "success": true,
        "notifications": list.notifications,
        "unread": list.unread
    })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    session: Session,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Value>, ApiError> {
    let notification =
        notification_service::mark_read(state.db(), session.profile_id(), id).await?;
    Ok(Json(json!({ "success": true, "notification": notification })))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    let updated = notification_service::mark_all_read(state.db(), session.profile_id()).await?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}

#[derive(Deserialize)]
pub struct RegisterToken {
    token: String,
    #[serde(default = "default_platform")]
    platform: String,
}

fn default_platform() -> String {
    "unknown".to_string()
}

pub async fn register_push_token(
    State(state): State<AppState>,
    session: Session,
    ApiJson(payload): ApiJson<RegisterToken>,
) -> Result<Json<Value>, ApiError> {
    let token = notification_service::register_push_token(
        state.db(),
        session.profile_id(),
        &payload.token,
        &payload.platform,
    )
    .await?;
    Ok(Json(json!({ "success": true, "push_token": token })))
}

#[derive(Deserialize)]
pub struct RemoveToken {
    token: String,
}

pub async fn remove_push_token(
    State(state): State<AppState>,
    session: Session,
    ApiJson(payload): ApiJson<RemoveToken>,
) -> Result<Json<Value>, ApiError> {
    notification_service::remove_push_token(state.db(), session.profile_id(), &payload.token)
        .await?;
    Ok(Json(json!({ "success": true })))
}
