use axum::{Json, extract::State};
use sea_orm::*;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::extract::ApiJson;
use crate::auth::{Session, create_jwt, hash_password, verify_password};
use crate::error::ApiError;
use crate::infrastructure::AppState;
use crate::models::ProfileDto;
use crate::models::profile;

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid credentials".to_string())
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    responses(
        (status = 200, description = "Session token issued"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    tracing::info!("Login attempt for {}", payload.email);

    let Some(profile) = state.profile_repo.find_by_email(&payload.email).await? else {
        tracing::warn!("Unknown email: {}", payload.email);
        return Err(invalid_credentials());
    };

    match verify_password(&payload.password, &profile.password_hash) {
        Ok(true) => {}
        _ => {
            tracing::warn!("Password verification failed for profile {}", profile.id);
            return Err(invalid_credentials());
        }
    }

    if profile.status != "active" {
        tracing::warn!("Login refused for inactive profile {}", profile.id);
        return Err(ApiError::Unauthorized("Account is inactive".to_string()));
    }

    let token = create_jwt(&state.config.jwt_secret, profile.id, &profile.role)
        .map_err(ApiError::Internal)?;

    tracing::info!("Profile {} signed in as {}", profile.id, profile.role);
    Ok(Json(json!({
        "success": true,
        "token": token,
        "profile": ProfileDto::from(profile)
    })))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "The signed-in profile"),
        (status = 401, description = "Missing or invalid session")
    )
)]
pub async fn get_me(session: Session) -> Json<Value> {
    Json(json!({
        "success": true,
        "profile": ProfileDto::from(session.profile)
    }))
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

/// Accounts created by a dispatcher start with a temporary password
pub async fn change_password(
    State(state): State<AppState>,
    session: Session,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.new_password.chars().count() < 8 {
        return Err(ApiError::BadRequest(
            "New password must be at least 8 characters".to_string(),
        ));
    }
    if !verify_password(&payload.current_password, &session.profile.password_hash)
        .unwrap_or(false)
    {
        return Err(ApiError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }

    let password_hash = hash_password(&payload.new_password).map_err(ApiError::Internal)?;
    let profile_id = session.profile_id();
    let mut active: profile::ActiveModel = session.profile.into();
    active.password_hash = Set(password_hash);
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());
    active.update(state.db()).await?;

    tracing::info!("Profile {} changed their password", profile_id);
    Ok(Json(json!({ "success": true })))
}
