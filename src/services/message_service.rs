//! Message Service - dispatcher/facility conversations

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, Role};
use crate::infrastructure::auth::Session;
use crate::models::conversation::{self, Entity as Conversation};
use crate::models::facility::Entity as Facility;
use crate::models::message::{self, Entity as Message};

#[derive(Debug, Clone, Deserialize)]
pub struct NewConversation {
    pub facility_id: Option<i32>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: conversation::Model,
    pub unread: u64,
}

#[derive(Debug, Serialize)]
pub struct ConversationThread {
    pub conversation: conversation::Model,
    pub messages: Vec<message::Model>,
}

/// Which facility's conversations a session may see. `None` means all of them.
fn facility_scope(session: &Session) -> Result<Option<i32>, DomainError> {
    match session.role() {
        Some(Role::Dispatcher) => Ok(None),
        Some(Role::Facility) => session
            .profile
            .facility_id
            .map(Some)
            .ok_or_else(|| DomainError::Validation("Account is not linked to a facility".to_string())),
        _ => Err(DomainError::NotFound("Conversation")),
    }
}

async fn load_visible(
    db: &DatabaseConnection,
    session: &Session,
    id: i32,
) -> Result<conversation::Model, DomainError> {
    let scope = facility_scope(session)?;
    Conversation::find_by_id(id)
        .one(db)
        .await?
        .filter(|c| scope.is_none_or(|facility_id| c.facility_id == facility_id))
        .ok_or(DomainError::NotFound("Conversation"))
}

pub async fn list_conversations(
    db: &DatabaseConnection,
    session: &Session,
) -> Result<Vec<ConversationSummary>, DomainError> {
    let mut query = Conversation::find();
    if let Some(facility_id) = facility_scope(session)? {
        query = query.filter(conversation::Column::FacilityId.eq(facility_id));
    }
    let conversations = query
        .order_by_desc(conversation::Column::LastMessageAt)
        .all(db)
        .await?;

    let mut summaries = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        let unread = Message::find()
            .filter(message::Column::ConversationId.eq(conversation.id))
            .filter(message::Column::SenderId.ne(session.profile_id()))
            .filter(message::Column::ReadAt.is_null())
            .count(db)
            .await?;
        summaries.push(ConversationSummary {
            conversation,
            unread,
        });
    }
    Ok(summaries)
}

pub async fn start_conversation(
    db: &DatabaseConnection,
    session: &Session,
    input: NewConversation,
) -> Result<ConversationThread, DomainError> {
    if input.subject.trim().is_empty() || input.body.trim().is_empty() {
        return Err(DomainError::Validation(
            "subject and body are required".to_string(),
        ));
    }

    let facility_id = match facility_scope(session)? {
        Some(own) => own,
        None => input
            .facility_id
            .ok_or_else(|| DomainError::Validation("facility_id is required".to_string()))?,
    };
    Facility::find_by_id(facility_id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound("Facility"))?;

    let now = Utc::now().to_rfc3339();
    let txn = db.begin().await?;

    let conversation = conversation::ActiveModel {
        facility_id: Set(facility_id),
        subject: Set(input.subject.trim().to_string()),
        created_by: Set(session.profile_id()),
        last_message_at: Set(now.clone()),
        created_at: Set(now.clone()),
        updated_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let first = message::ActiveModel {
        conversation_id: Set(conversation.id),
        sender_id: Set(session.profile_id()),
        body: Set(input.body),
        read_at: Set(None),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    tracing::info!(
        "Conversation {} started with facility {}",
        conversation.id,
        facility_id
    );
    Ok(ConversationThread {
        conversation,
        messages: vec![first],
    })
}

/// Messages oldest first. Opening a thread marks the other side's messages read.
pub async fn open_conversation(
    db: &DatabaseConnection,
    session: &Session,
    id: i32,
) -> Result<ConversationThread, DomainError> {
    let conversation = load_visible(db, session, id).await?;

    Message::update_many()
        .col_expr(message::Column::ReadAt, Expr::value(Utc::now().to_rfc3339()))
        .filter(message::Column::ConversationId.eq(id))
        .filter(message::Column::SenderId.ne(session.profile_id()))
        .filter(message::Column::ReadAt.is_null())
        .exec(db)
        .await?;

    let messages = Message::find()
        .filter(message::Column::ConversationId.eq(id))
        .order_by_asc(message::Column::CreatedAt)
        .order_by_asc(message::Column::Id)
        .all(db)
        .await?;

    Ok(ConversationThread {
        conversation,
        messages,
    })
}

pub async fn post_message(
    db: &DatabaseConnection,
    session: &Session,
    id: i32,
    body: String,
) -> Result<message::Model, DomainError> {
    if body.trim().is_empty() {
        return Err(DomainError::Validation(
            "Message body cannot be empty".to_string(),
        ));
    }
    let conversation = load_visible(db, session, id).await?;

    let now = Utc::now().to_rfc3339();
    let message = message::ActiveModel {
        conversation_id: Set(conversation.id),
        sender_id: Set(session.profile_id()),
        body: Set(body),
        read_at: Set(None),
        created_at: Set(now.clone()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let mut active: conversation::ActiveModel = conversation.into();
    active.last_message_at = Set(now.clone());
    active.updated_at = Set(now);
    active.update(db).await?;

    Ok(message)
}
