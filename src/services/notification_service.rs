//! Notification Service - in-app notification rows plus best-effort push and email

use sea_orm::*;
use serde::Serialize;

use crate::domain::DomainError;
use crate::models::notification::{self, Entity as Notification};
use crate::models::profile::Entity as Profile;
use crate::models::push_token::{self, Entity as PushToken};
use crate::modules::integrations::{Mailer, PushClient};

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub title: String,
    pub body: String,
    pub kind: &'static str,
    pub related_trip_id: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct NotificationList {
    pub notifications: Vec<notification::Model>,
    pub unread: usize,
}

/// Fans a notification out to the in-app inbox, the user's devices and their email.
#[derive(Clone)]
pub struct Notifier {
    push: PushClient,
    mailer: Option<Mailer>,
}

impl Notifier {
    pub fn new(push: PushClient, mailer: Option<Mailer>) -> Self {
        Self { push, mailer }
    }

    /// Stores the notification and spawns delivery. Delivery failures are only logged.
    pub async fn notify_user(
        &self,
        db: &DatabaseConnection,
        user_id: i32,
        input: NewNotification,
    ) -> Result<notification::Model, DomainError> {
        let row = notification::ActiveModel {
            user_id: Set(user_id),
            title: Set(input.title.clone()),
            body: Set(input.body.clone()),
            kind: Set(input.kind.to_string()),
            related_trip_id: Set(input.related_trip_id),
            read_at: Set(None),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        let notifier = self.clone();
        let db = db.clone();
        tokio::spawn(async move {
            notifier.deliver(&db, user_id, &input).await;
        });

        Ok(row)
    }

    /// Push to every registered device and send an email copy, concurrently.
    pub async fn deliver(&self, db: &DatabaseConnection, user_id: i32, input: &NewNotification) {
        futures::join!(
            self.push_to_devices(db, user_id, input),
            self.email_copy(db, user_id, input)
        );
    }

    async fn push_to_devices(&self, db: &DatabaseConnection, user_id: i32, input: &NewNotification) {
        let tokens: Vec<String> = match PushToken::find()
            .filter(push_token::Column::UserId.eq(user_id))
            .all(db)
            .await
        {
            Ok(rows) => rows.into_iter().map(|t| t.token).collect(),
            Err(e) => {
                tracing::error!("Failed to load push tokens for user {}: {}", user_id, e);
                return;
            }
        };

        let data = input
            .related_trip_id
            .map(|id| serde_json::json!({ "trip_id": id, "kind": input.kind }));

        match self.push.send(&tokens, &input.title, &input.body, data).await {
            Ok(stale) if !stale.is_empty() => {
                tracing::info!("Removing {} unregistered push tokens", stale.len());
                if let Err(e) = PushToken::delete_many()
                    .filter(push_token::Column::Token.is_in(stale))
                    .exec(db)
                    .await
                {
                    tracing::error!("Failed to remove stale push tokens: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Push delivery failed for user {}: {}", user_id, e),
        }
    }

    async fn email_copy(&self, db: &DatabaseConnection, user_id: i32, input: &NewNotification) {
        let Some(mailer) = &self.mailer else {
            return;
        };
        match Profile::find_by_id(user_id).one(db).await {
            Ok(Some(profile)) => {
                if let Err(e) = mailer.send(&profile.email, &input.title, &input.body).await {
                    tracing::warn!("Email delivery to {} failed: {}", profile.email, e);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::error!("Failed to load profile {} for email: {}", user_id, e),
        }
    }
}

/// List a user's notifications, newest first
pub async fn list_for_user(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<NotificationList, DomainError> {
    let notifications = Notification::find()
        .filter(notification::Column::UserId.eq(user_id))
        .order_by_desc(notification::Column::CreatedAt)
        .order_by_desc(notification::Column::Id)
        .all(db)
        .await?;

    let unread = notifications.iter().filter(|n| n.read_at.is_none()).count();
    Ok(NotificationList {
        notifications,
        unread,
    })
}

/// Mark one notification read. Only the owner may do so.
pub async fn mark_read(
    db: &DatabaseConnection,
    user_id: i32,
    id: i32,
) -> Result<notification::Model, DomainError> {
    let existing = Notification::find_by_id(id)
        .filter(notification::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or(DomainError::NotFound("Notification"))?;

    if existing.read_at.is_some() {
        return Ok(existing);
    }

    let mut active: notification::ActiveModel = existing.into();
    active.read_at = Set(Some(chrono::Utc::now().to_rfc3339()));
    Ok(active.update(db).await?)
}

pub async fn mark_all_read(db: &DatabaseConnection, user_id: i32) -> Result<u64, DomainError> {
    let result = Notification::update_many()
        .col_expr(
            notification::Column::ReadAt,
            sea_query::Expr::value(chrono::Utc::now().to_rfc3339()),
        )
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::ReadAt.is_null())
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Register a device token for the user, moving it over if another account owned it.
pub async fn register_push_token(
    db: &DatabaseConnection,
    user_id: i32,
    token: &str,
    platform: &str,
) -> Result<push_token::Model, DomainError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(DomainError::Validation("Push token is required".to_string()));
    }
    let now = chrono::Utc::now().to_rfc3339();

    if let Some(existing) = PushToken::find()
        .filter(push_token::Column::Token.eq(token))
        .one(db)
        .await?
    {
        let mut active: push_token::ActiveModel = existing.into();
        active.user_id = Set(user_id);
        active.platform = Set(platform.to_string());
        active.updated_at = Set(now);
        return Ok(active.update(db).await?);
    }

    Ok(push_token::ActiveModel {
        user_id: Set(user_id),
        token: Set(token.to_string()),
        platform: Set(platform.to_string()),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?)
}

pub async fn remove_push_token(
    db: &DatabaseConnection,
    user_id: i32,
    token: &str,
) -> Result<(), DomainError> {
    let result = PushToken::delete_many()
        .filter(push_token::Column::UserId.eq(user_id))
        .filter(push_token::Column::Token.eq(token.trim()))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(DomainError::NotFound("Push token"));
    }
    Ok(())
}
