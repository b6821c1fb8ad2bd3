use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::extract::{ApiJson, ApiPath};
use crate::auth::Session;
use crate::error::ApiError;
use crate::infrastructure::AppState;
use crate::services::message_service::{self, NewConversation};

pub async fn list_conversations(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Value>, ApiError> {
    let conversations = message_service::list_conversations(state.db(), &session).await?;
    Ok(Json(json!({ "success": true, "conversations": conversations })))
}

pub async fn start_conversation(
    State(state): State<AppState>,
    session: Session,
    ApiJson(payload): ApiJson<NewConversation>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let thread = message_service::start_conversation(state.db(), &session, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "conversation": thread.conversation,
            "messages": thread.messages
        })),
    ))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    session: Session,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Value>, ApiError> {
    let thread = message_service::open_conversation(state.db(), &session, id).await?;
    Ok(Json(json!({
        "success": true,
        "conversation": thread.conversation,
        "messages": thread.messages
    })))
}

#[derive(Deserialize)]
pub struct PostMessage {
    body: String,
}

pub async fn post_message(
    State(state): State<AppState>,
    session: Session,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<PostMessage>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let message = message_service::post_message(state.db(), &session, id, payload.body).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": message })),
    ))
}
