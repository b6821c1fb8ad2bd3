use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};

use crate::domain::Role;
use crate::error::ApiError;
use crate::infrastructure::AppState;
use crate::models::profile;

const SESSION_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // profile id
    pub role: String,
    pub exp: usize,
}

impl Claims {
    pub fn profile_id(&self) -> Option<i32> {
        self.sub.parse().ok()
    }
}

pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| e.to_string())?
        .to_string();
    Ok(password_hash)
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, String> {
    let parsed_hash = PasswordHash::new(password_hash).map_err(|e| e.to_string())?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Random password handed out once when a dispatcher creates an account.
pub fn generate_temporary_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect()
}

pub fn create_jwt(secret: &str, profile_id: i32, role: &str) -> Result<String, String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(SESSION_HOURS))
        .ok_or_else(|| "timestamp overflow".to_string())?
        .timestamp();

    let claims = Claims {
        sub: profile_id.to_string(),
        role: role.to_owned(),
        exp: expiration as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| e.to_string())
}

pub fn decode_jwt(secret: &str, token: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header format".to_string()))
}

/// An authenticated request: valid bearer token whose profile still exists and is active.
///
/// The role is read from the profile row, not from the token, so a role change
/// takes effect on the next request.
#[derive(Debug, Clone)]
pub struct Session {
    pub profile: profile::Model,
}

impl Session {
    pub fn profile_id(&self) -> i32 {
        self.profile.id
    }

    pub fn role(&self) -> Option<Role> {
        self.profile.role.parse().ok()
    }

    pub fn is_dispatcher(&self) -> bool {
        self.role() == Some(Role::Dispatcher)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let token = bearer_token(parts)?;

        let claims = decode_jwt(&state.config.jwt_secret, token)
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;
        let profile_id = claims
            .profile_id()
            .ok_or_else(|| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

        let profile = state
            .profile_repo
            .find_by_id(profile_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Session user no longer exists".to_string()))?;

        if profile.status != "active" {
            tracing::warn!("Rejected session for inactive profile {}", profile.id);
            return Err(ApiError::Unauthorized("Account is inactive".to_string()));
        }

        Ok(Session { profile })
    }
}

/// A session whose profile has the `dispatcher` role.
#[derive(Debug, Clone)]
pub struct DispatcherSession(pub Session);

impl DispatcherSession {
    pub fn profile_id(&self) -> i32 {
        self.0.profile_id()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for DispatcherSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        if !session.is_dispatcher() {
            tracing::warn!(
                "Profile {} with role '{}' attempted a dispatcher-only action",
                session.profile.id,
                session.profile.role
            );
            return Err(ApiError::Forbidden(
                "Access denied. Dispatcher role required".to_string(),
            ));
        }
        Ok(DispatcherSession(session))
    }
}
