//! Trip Service - creation rules, driver assignment and the approve/reject/complete workflow

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::Serialize;

use crate::domain::{DomainError, NewTrip, Role, TripAction, TripStatus, TripUpdate};
use crate::infrastructure::AppState;
use crate::models::managed_client::Entity as ManagedClient;
use crate::models::trip::{self, Entity as Trip};
use crate::modules::integrations::{ChargeOutcome, ChargeRequest};
use crate::services::notification_service::NewNotification;

/// What happened to the card charge during an approval
#[derive(Debug, Clone, Serialize)]
pub struct PaymentSummary {
    pub charged: bool,
    /// True when the trip was approved even though the charge did not go through
    pub fallback: bool,
    pub payment_intent_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
    pub trip: trip::Model,
    pub payment: Option<PaymentSummary>,
}

fn require_text(value: &str, field: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Validate and store a new trip.
///
/// Exactly one rider must be given. Trips for a facility's managed client
/// inherit the facility and start `upcoming`; everything else starts `pending`.
pub async fn create_trip(state: &AppState, mut input: NewTrip) -> Result<trip::Model, DomainError> {
    require_text(&input.pickup_address, "pickup_address")?;
    require_text(&input.destination_address, "destination_address")?;
    require_text(&input.pickup_time, "pickup_time")?;

    if input.additional_passengers < 0 {
        return Err(DomainError::Validation(
            "additional_passengers cannot be negative".to_string(),
        ));
    }
    if input.price.is_some_and(|p| p < 0.0) {
        return Err(DomainError::Validation("price cannot be negative".to_string()));
    }

    match (input.user_id, input.managed_client_id) {
        (Some(user_id), None) => {
            let rider = state
                .profile_repo
                .find_by_id(user_id)
                .await?
                .ok_or_else(|| DomainError::Validation(format!("Client {} not found", user_id)))?;
            if rider.role != Role::Client.as_str() {
                return Err(DomainError::Validation(format!(
                    "Profile {} is not a client",
                    user_id
                )));
            }
        }
        (None, Some(client_id)) => {
            let client = ManagedClient::find_by_id(client_id)
                .one(state.db())
                .await?
                .ok_or_else(|| {
                    DomainError::Validation(format!("Managed client {} not found", client_id))
                })?;
            match input.facility_id {
                Some(facility_id) if facility_id != client.facility_id => {
                    return Err(DomainError::Validation(
                        "Managed client does not belong to that facility".to_string(),
                    ));
                }
                _ => input.facility_id = Some(client.facility_id),
            }
        }
        _ => {
            return Err(DomainError::Validation(
                "Provide exactly one of user_id or managed_client_id".to_string(),
            ));
        }
    }

    let status = if input.facility_id.is_some() {
        TripStatus::Upcoming
    } else {
        TripStatus::Pending
    };

    let trip = state.trip_repo.create(input, status.as_str()).await?;
    tracing::info!("Trip {} created with status {}", trip.id, trip.status);
    Ok(trip)
}

async fn load_trip(state: &AppState, trip_id: i32) -> Result<trip::Model, DomainError> {
    state
        .trip_repo
        .find_by_id(trip_id)
        .await?
        .ok_or(DomainError::NotFound("Trip"))
}

fn current_status(trip: &trip::Model) -> Result<TripStatus, DomainError> {
    trip.status.parse()
}

/// Edit the scheduling fields of a trip that is still open
pub async fn update_trip(
    state: &AppState,
    trip_id: i32,
    input: TripUpdate,
) -> Result<trip::Model, DomainError> {
    let trip = load_trip(state, trip_id).await?;
    if current_status(&trip)?.is_terminal() {
        return Err(DomainError::InvalidState(format!(
            "Cannot edit a {} trip",
            trip.status
        )));
    }
    if let Some(address) = &input.pickup_address {
        require_text(address, "pickup_address")?;
    }
    if let Some(address) = &input.destination_address {
        require_text(address, "destination_address")?;
    }
    if let Some(time) = &input.pickup_time {
        require_text(time, "pickup_time")?;
    }
    if input.additional_passengers.is_some_and(|n| n < 0) {
        return Err(DomainError::Validation(
            "additional_passengers cannot be negative".to_string(),
        ));
    }
    if let Some(price) = input.price {
        if price.is_some_and(|p| p < 0.0) {
            return Err(DomainError::Validation("price cannot be negative".to_string()));
        }
        // The amount is fixed once a charge has been attempted.
        let charging = matches!(
            current_status(&trip)?,
            TripStatus::ApprovedPendingPayment | TripStatus::PaidInProgress
        );
        if charging && price != trip.price {
            return Err(DomainError::InvalidState(format!(
                "Cannot change the price of a {} trip",
                trip.status
            )));
        }
    }

    state.trip_repo.update(trip_id, input).await
}

pub async fn assign_driver(
    state: &AppState,
    trip_id: i32,
    driver_id: i32,
) -> Result<trip::Model, DomainError> {
    let trip = load_trip(state, trip_id).await?;
    if current_status(&trip)?.is_terminal() {
        return Err(DomainError::InvalidState(format!(
            "Cannot assign a driver to a {} trip",
            trip.status
        )));
    }

    let driver = state
        .profile_repo
        .find_by_id(driver_id)
        .await?
        .ok_or(DomainError::NotFound("Driver"))?;
    if driver.role != Role::Driver.as_str() {
        return Err(DomainError::Validation(format!(
            "Profile {} is not a driver",
            driver_id
        )));
    }
    if driver.status != "active" {
        return Err(DomainError::Validation(format!(
            "Driver {} is inactive",
            driver.full_name()
        )));
    }

    let mut active: trip::ActiveModel = trip.into();
    active.driver_id = Set(Some(driver_id));
    active.updated_at = Set(Utc::now().to_rfc3339());
    let updated = active.update(state.db()).await?;

    tracing::info!("Driver {} assigned to trip {}", driver_id, trip_id);
    Ok(updated)
}

/// Statuses from which `action` is permitted
fn allowed_from(action: TripAction) -> Vec<&'static str> {
    TripStatus::ALL
        .into_iter()
        .filter(|s| s.allows(action))
        .map(|s| s.as_str())
        .collect()
}

/// Update the trip only while it is still in a status that allows `action`.
/// A concurrent transition leaves zero rows affected.
async fn transition(
    db: &DatabaseConnection,
    trip: &trip::Model,
    action: TripAction,
    columns: Vec<(trip::Column, Value)>,
) -> Result<(), DomainError> {
    let mut update = Trip::update_many()
        .col_expr(trip::Column::UpdatedAt, Expr::value(Utc::now().to_rfc3339()));
    for (column, value) in columns {
        update = update.col_expr(column, Expr::value(value));
    }

    let result = update
        .filter(trip::Column::Id.eq(trip.id))
        .filter(trip::Column::Status.is_in(allowed_from(action)))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(DomainError::InvalidState(format!(
            "Trip {} changed status before it could be {}d",
            trip.id,
            action.as_str()
        )));
    }
    Ok(())
}

/// Apply a dispatcher action to a trip.
///
/// The status is checked before anything is written; a disallowed action
/// leaves the stored row untouched.
pub async fn apply_action(
    state: &AppState,
    trip_id: i32,
    action: TripAction,
    reason: Option<String>,
) -> Result<ActionResult, DomainError> {
    let trip = load_trip(state, trip_id).await?;
    let status = current_status(&trip)?;

    if !status.allows(action) {
        let allowed = allowed_from(action).join(", ");
        return Err(DomainError::InvalidState(format!(
            "Cannot {} a trip with status '{}'. Allowed: {}",
            action.as_str(),
            status,
            allowed
        )));
    }

    let result = match action {
        TripAction::Approve => approve(state, trip).await?,
        TripAction::Reject => {
            let reason = reason.unwrap_or_default();
            if reason.trim().is_empty() {
                return Err(DomainError::Validation(
                    "A reason is required to reject a trip".to_string(),
                ));
            }
            reject(state, trip, reason).await?
        }
        TripAction::Complete => complete(state, trip).await?,
    };

    tracing::info!(
        "Trip {} {}: {} -> {}",
        trip_id,
        action.as_str(),
        status,
        result.trip.status
    );
    notify_rider(state, &result).await;
    Ok(result)
}

async fn approve(state: &AppState, trip: trip::Model) -> Result<ActionResult, DomainError> {
    let db = state.db();
    let now = Utc::now().to_rfc3339();

    if !trip.is_payment_eligible() {
        transition(
            db,
            &trip,
            TripAction::Approve,
            vec![
                (trip::Column::Status, TripStatus::Upcoming.as_str().into()),
                (trip::Column::ApprovedAt, now.into()),
            ],
        )
        .await?;
        return Ok(ActionResult {
            trip: load_trip(state, trip.id).await?,
            payment: None,
        });
    }

    // Approved first so the trip is never stuck in pending if the charge hangs.
    transition(
        db,
        &trip,
        TripAction::Approve,
        vec![
            (
                trip::Column::Status,
                TripStatus::ApprovedPendingPayment.as_str().into(),
            ),
            (trip::Column::ApprovedAt, now.into()),
        ],
    )
    .await?;

    let request = ChargeRequest {
        trip_id: trip.id,
        user_id: trip.user_id.unwrap_or_default(),
        payment_method_id: trip.payment_method_id.clone().unwrap_or_default(),
        amount: trip.price.unwrap_or_default(),
    };

    let (columns, mut summary) = match state.payments.charge(&request).await {
        ChargeOutcome::Charged { payment_intent_id } => (
            vec![
                (
                    trip::Column::Status,
                    Value::from(TripStatus::PaidInProgress.as_str()),
                ),
                (trip::Column::PaymentStatus, "paid".into()),
                (trip::Column::PaymentIntentId, payment_intent_id.clone().into()),
                (trip::Column::PaymentNote, Option::<String>::None.into()),
            ],
            PaymentSummary {
                charged: true,
                fallback: false,
                payment_intent_id,
                message: "Payment charged".to_string(),
            },
        ),
        ChargeOutcome::Failed { reason } => {
            tracing::warn!(
                "Charge for trip {} failed, approving without payment: {}",
                trip.id,
                reason
            );
            (
                vec![
                    (trip::Column::PaymentStatus, Value::from("pending")),
                    (
                        trip::Column::PaymentNote,
                        format!("Payment pending: {}", reason).into(),
                    ),
                ],
                PaymentSummary {
                    charged: false,
                    fallback: true,
                    payment_intent_id: None,
                    message: format!("Trip approved, payment pending: {}", reason),
                },
            )
        }
    };

    let mut update = Trip::update_many()
        .col_expr(trip::Column::UpdatedAt, Expr::value(Utc::now().to_rfc3339()));
    for (column, value) in columns {
        update = update.col_expr(column, Expr::value(value));
    }
    let result = update
        .filter(trip::Column::Id.eq(trip.id))
        .filter(trip::Column::Status.eq(TripStatus::ApprovedPendingPayment.as_str()))
        .exec(db)
        .await?;

    let current = load_trip(state, trip.id).await?;
    if result.rows_affected == 0 {
        tracing::error!(
            "Trip {} moved to {} while its charge was in flight (charged: {}, intent: {:?})",
            trip.id,
            current.status,
            summary.charged,
            summary.payment_intent_id
        );
        summary.fallback = true;
        summary.message = format!(
            "Trip is now {}; payment result was not applied",
            current.status
        );
    }

    Ok(ActionResult {
        trip: current,
        payment: Some(summary),
    })
}

async fn reject(
    state: &AppState,
    trip: trip::Model,
    reason: String,
) -> Result<ActionResult, DomainError> {
    transition(
        state.db(),
        &trip,
        TripAction::Reject,
        vec![
            (trip::Column::Status, TripStatus::Cancelled.as_str().into()),
            (trip::Column::CancellationReason, reason.into()),
            (trip::Column::CancelledAt, Utc::now().to_rfc3339().into()),
        ],
    )
    .await?;

    Ok(ActionResult {
        trip: load_trip(state, trip.id).await?,
        payment: None,
    })
}

async fn complete(state: &AppState, trip: trip::Model) -> Result<ActionResult, DomainError> {
    transition(
        state.db(),
        &trip,
        TripAction::Complete,
        vec![
            (trip::Column::Status, TripStatus::Completed.as_str().into()),
            (trip::Column::CompletedAt, Utc::now().to_rfc3339().into()),
        ],
    )
    .await?;

    Ok(ActionResult {
        trip: load_trip(state, trip.id).await?,
        payment: None,
    })
}

fn rider_message(result: &ActionResult) -> (String, String) {
    let trip = &result.trip;
    match trip.status.as_str() {
        "cancelled" => (
            "Trip cancelled".to_string(),
            format!(
                "Your trip on {} was cancelled: {}",
                trip.pickup_time,
                trip.cancellation_reason.as_deref().unwrap_or_default()
            ),
        ),
        "completed" => (
            "Trip completed".to_string(),
            format!("Your trip to {} is complete.", trip.destination_address),
        ),
        _ if result.payment.as_ref().is_some_and(|p| p.fallback) => (
            "Trip approved".to_string(),
            format!(
                "Your trip on {} is approved. We could not charge your card yet; a dispatcher will follow up.",
                trip.pickup_time
            ),
        ),
        _ => (
            "Trip approved".to_string(),
            format!(
                "Your trip on {} from {} is confirmed.",
                trip.pickup_time, trip.pickup_address
            ),
        ),
    }
}

async fn notify_rider(state: &AppState, result: &ActionResult) {
    let Some(user_id) = result.trip.user_id else {
        return;
    };
    let (title, body) = rider_message(result);
    let input = NewNotification {
        title,
        body,
        kind: "trip_update",
        related_trip_id: Some(result.trip.id),
    };
    if let Err(e) = state.notifier.notify_user(state.db(), user_id, input).await {
        tracing::error!(
            "Failed to notify user {} about trip {}: {}",
            user_id,
            result.trip.id,
            e
        );
    }
}
