//! Invoice Service - facility billing, manual invoices, payment verification and CSV export

use chrono::{Datelike, Days, NaiveDate, Utc};
use sea_orm::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::domain::{DomainError, InvoiceStatus, Role, TripStatus};
use crate::models::facility::{self, Entity as Facility};
use crate::models::invoice::{self, Entity as Invoice};
use crate::models::profile::{self, Entity as Profile};
use crate::models::trip::{self, Entity as Trip};

const DEFAULT_DUE_DAYS: u64 = 30;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct InvoiceFilter {
    pub status: Option<String>,
    pub facility_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateInvoice {
    pub facility_id: i32,
    /// YYYY-MM-DD, inclusive
    pub period_start: String,
    /// YYYY-MM-DD, inclusive
    pub period_end: String,
    pub due_days: Option<u64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManualInvoice {
    pub user_id: i32,
    pub amount: f64,
    pub due_date: Option<String>,
    #[serde(default)]
    pub trip_ids: Vec<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InvoiceDetail {
    #[serde(flatten)]
    pub invoice: invoice::Model,
    pub facility_name: Option<String>,
    pub trips: Vec<trip::Model>,
}

/// `INV-YYYYMM-XXXXXXXX`, the suffix taken from a random UUID
pub fn invoice_number(now: chrono::DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "INV-{:04}{:02}-{}",
        now.year(),
        now.month(),
        suffix[..8].to_uppercase()
    )
}

fn parse_day(value: &str, field: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| DomainError::Validation(format!("{} must be a YYYY-MM-DD date", field)))
}

fn due_date_after(today: NaiveDate, days: u64) -> String {
    today
        .checked_add_days(Days::new(days))
        .unwrap_or(today)
        .format("%Y-%m-%d")
        .to_string()
}

async fn find_invoice(db: &DatabaseConnection, id: i32) -> Result<invoice::Model, DomainError> {
    Invoice::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound("Invoice"))
}

pub async fn list_invoices(
    db: &DatabaseConnection,
    filter: InvoiceFilter,
) -> Result<Vec<invoice::Model>, DomainError> {
    let mut condition = Condition::all();

    if let Some(status) = filter.status
        && !status.is_empty()
    {
        let status: InvoiceStatus = status.parse()?;
        condition = condition.add(invoice::Column::Status.eq(status.as_str()));
    }
    if let Some(facility_id) = filter.facility_id {
        condition = condition.add(invoice::Column::FacilityId.eq(facility_id));
    }

    Ok(Invoice::find()
        .filter(condition)
        .order_by_desc(invoice::Column::CreatedAt)
        .order_by_desc(invoice::Column::Id)
        .all(db)
        .await?)
}

pub async fn get_invoice(db: &DatabaseConnection, id: i32) -> Result<InvoiceDetail, DomainError> {
    let invoice = find_invoice(db, id).await?;

    let facility_name = match invoice.facility_id {
        Some(facility_id) => Facility::find_by_id(facility_id)
            .one(db)
            .await?
            .map(|f| f.name),
        None => None,
    };

    let trip_ids = invoice.trip_id_list();
    let trips = if trip_ids.is_empty() {
        Vec::new()
    } else {
        Trip::find()
            .filter(trip::Column::Id.is_in(trip_ids))
            .order_by_asc(trip::Column::PickupTime)
            .all(db)
            .await?
    };

    Ok(InvoiceDetail {
        invoice,
        facility_name,
        trips,
    })
}

/// Ids of trips already billed on a live (non-cancelled) invoice
async fn invoiced_trip_ids(
    db: &DatabaseConnection,
    facility_id: i32,
) -> Result<HashSet<i32>, DomainError> {
    let invoices = Invoice::find()
        .filter(invoice::Column::FacilityId.eq(facility_id))
        .filter(invoice::Column::Status.ne(InvoiceStatus::Cancelled.as_str()))
        .all(db)
        .await?;

    Ok(invoices
        .iter()
        .flat_map(|inv| inv.trip_id_list())
        .collect())
}

/// Bill a facility for its completed trips in a period.
pub async fn generate_facility_invoice(
    db: &DatabaseConnection,
    input: GenerateInvoice,
) -> Result<invoice::Model, DomainError> {
    let start = parse_day(&input.period_start, "period_start")?;
    let end = parse_day(&input.period_end, "period_end")?;
    if end < start {
        return Err(DomainError::Validation(
            "period_end must not be before period_start".to_string(),
        ));
    }

    let facility = Facility::find_by_id(input.facility_id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound("Facility"))?;

    let end_exclusive = end.checked_add_days(Days::new(1)).unwrap_or(end);
    let already_billed = invoiced_trip_ids(db, facility.id).await?;

    let trips: Vec<trip::Model> = Trip::find()
        .filter(trip::Column::FacilityId.eq(facility.id))
        .filter(trip::Column::Status.eq(TripStatus::Completed.as_str()))
        .filter(trip::Column::PickupTime.gte(start.format("%Y-%m-%d").to_string()))
        .filter(trip::Column::PickupTime.lt(end_exclusive.format("%Y-%m-%d").to_string()))
        .order_by_asc(trip::Column::PickupTime)
        .all(db)
        .await?
        .into_iter()
        .filter(|t| !already_billed.contains(&t.id))
        .collect();

    if trips.is_empty() {
        return Err(DomainError::Validation(format!(
            "No billable trips for {} between {} and {}",
            facility.name, input.period_start, input.period_end
        )));
    }

    let amount: f64 = trips.iter().filter_map(|t| t.price).sum();
    let trip_ids: Vec<i32> = trips.iter().map(|t| t.id).collect();
    let now = Utc::now();

    let created = invoice::ActiveModel {
        invoice_number: Set(invoice_number(now)),
        facility_id: Set(Some(facility.id)),
        user_id: Set(None),
        amount: Set((amount * 100.0).round() / 100.0),
        status: Set(InvoiceStatus::Pending.as_str().to_string()),
        period_start: Set(Some(start.format("%Y-%m-%d").to_string())),
        period_end: Set(Some(end.format("%Y-%m-%d").to_string())),
        due_date: Set(due_date_after(
            now.date_naive(),
            input.due_days.unwrap_or(DEFAULT_DUE_DAYS),
        )),
        trip_ids: Set(serde_json::to_string(&trip_ids).unwrap_or_else(|_| "[]".to_string())),
        notes: Set(input.notes),
        created_at: Set(now.to_rfc3339()),
        updated_at: Set(now.to_rfc3339()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(
        "Invoice {} generated for facility {}: {} trips, {:.2}",
        created.invoice_number,
        facility.id,
        trip_ids.len(),
        created.amount
    );
    Ok(created)
}

/// Invoice an individual client directly
pub async fn create_manual_invoice(
    db: &DatabaseConnection,
    input: ManualInvoice,
) -> Result<invoice::Model, DomainError> {
    if input.amount.is_nan() || input.amount <= 0.0 {
        return Err(DomainError::Validation("amount must be positive".to_string()));
    }

    let user = Profile::find_by_id(input.user_id)
        .one(db)
        .await?
        .filter(|p| p.role == Role::Client.as_str())
        .ok_or(DomainError::NotFound("Client"))?;

    let now = Utc::now();
    let due_date = match input.due_date {
        Some(due) => parse_day(&due, "due_date")?.format("%Y-%m-%d").to_string(),
        None => due_date_after(now.date_naive(), DEFAULT_DUE_DAYS),
    };

    let created = invoice::ActiveModel {
        invoice_number: Set(invoice_number(now)),
        facility_id: Set(None),
        user_id: Set(Some(user.id)),
        amount: Set(input.amount),
        status: Set(InvoiceStatus::Pending.as_str().to_string()),
        due_date: Set(due_date),
        trip_ids: Set(serde_json::to_string(&input.trip_ids).unwrap_or_else(|_| "[]".to_string())),
        notes: Set(input.notes),
        created_at: Set(now.to_rfc3339()),
        updated_at: Set(now.to_rfc3339()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!("Manual invoice {} created for user {}", created.invoice_number, user.id);
    Ok(created)
}

pub async fn update_status(
    db: &DatabaseConnection,
    id: i32,
    status: &str,
) -> Result<invoice::Model, DomainError> {
    let status: InvoiceStatus = status.parse()?;
    let existing = find_invoice(db, id).await?;

    let mut active: invoice::ActiveModel = existing.into();
    active.status = Set(status.as_str().to_string());
    active.updated_at = Set(Utc::now().to_rfc3339());

    Ok(active.update(db).await?)
}

pub async fn delete_invoice(db: &DatabaseConnection, id: i32) -> Result<(), DomainError> {
    let existing = find_invoice(db, id).await?;
    if existing.status == InvoiceStatus::Paid.as_str() {
        return Err(DomainError::InvalidState(
            "Paid invoices cannot be deleted".to_string(),
        ));
    }

    Invoice::delete_by_id(id).exec(db).await?;
    tracing::info!("Invoice {} deleted", existing.invoice_number);
    Ok(())
}

/// Record that the payer says they paid. Facility staff may only claim their own facility's invoices.
pub async fn claim_payment(
    db: &DatabaseConnection,
    id: i32,
    payment_reference: &str,
    claimant: &profile::Model,
) -> Result<invoice::Model, DomainError> {
    if payment_reference.trim().is_empty() {
        return Err(DomainError::Validation(
            "payment_reference is required".to_string(),
        ));
    }

    let existing = find_invoice(db, id).await?;

    let allowed = match claimant.role.parse::<Role>() {
        Ok(Role::Dispatcher) => true,
        Ok(Role::Facility) => {
            claimant.facility_id.is_some() && claimant.facility_id == existing.facility_id
        }
        Ok(Role::Client) => existing.user_id == Some(claimant.id),
        _ => false,
    };
    if !allowed {
        // Hide invoices the claimant cannot see
        return Err(DomainError::NotFound("Invoice"));
    }

    if existing.status == InvoiceStatus::Paid.as_str()
        || existing.status == InvoiceStatus::Cancelled.as_str()
    {
        return Err(DomainError::InvalidState(format!(
            "Invoice is already {}",
            existing.status
        )));
    }

    let now = Utc::now().to_rfc3339();
    let mut active: invoice::ActiveModel = existing.into();
    active.payment_reference = Set(Some(payment_reference.trim().to_string()));
    active.payment_claimed_at = Set(Some(now.clone()));
    active.updated_at = Set(now);

    let updated = active.update(db).await?;
    tracing::info!(
        "Payment claimed on invoice {} by profile {}",
        updated.invoice_number,
        claimant.id
    );
    Ok(updated)
}

/// Invoices with a payment claim waiting for a dispatcher to check it
/// Outstanding invoices with a payment claim that no dispatcher has checked yet
pub fn awaiting_verification() -> Select<Invoice> {
    Invoice::find()
        .filter(invoice::Column::PaymentClaimedAt.is_not_null())
        .filter(invoice::Column::PaymentVerifiedAt.is_null())
        .filter(invoice::Column::Status.is_in([
            InvoiceStatus::Pending.as_str(),
            InvoiceStatus::Overdue.as_str(),
        ]))
}

pub async fn pending_verification(
    db: &DatabaseConnection,
) -> Result<Vec<invoice::Model>, DomainError> {
    Ok(awaiting_verification()
        .order_by_asc(invoice::Column::PaymentClaimedAt)
        .all(db)
        .await?)
}

pub async fn verify_payment(
    db: &DatabaseConnection,
    id: i32,
    approved: bool,
    notes: Option<String>,
    dispatcher_id: i32,
) -> Result<invoice::Model, DomainError> {
    let existing = find_invoice(db, id).await?;
    if existing.payment_claimed_at.is_none() {
        return Err(DomainError::InvalidState(
            "No payment has been claimed for this invoice".to_string(),
        ));
    }
    if existing.payment_verified_at.is_some() {
        return Err(DomainError::InvalidState(
            "Payment was already verified".to_string(),
        ));
    }

    let now = Utc::now().to_rfc3339();
    let number = existing.invoice_number.clone();
    let mut active: invoice::ActiveModel = existing.into();

    if approved {
        active.status = Set(InvoiceStatus::Paid.as_str().to_string());
        active.payment_verified_at = Set(Some(now.clone()));
        active.verified_by = Set(Some(dispatcher_id));
    } else {
        active.status = Set(InvoiceStatus::Pending.as_str().to_string());
        active.payment_claimed_at = Set(None);
        active.payment_reference = Set(None);
    }
    active.verification_notes = Set(notes);
    active.updated_at = Set(now);

    let updated = active.update(db).await?;
    tracing::info!(
        "Payment on invoice {} {} by dispatcher {}",
        number,
        if approved { "verified" } else { "rejected" },
        dispatcher_id
    );
    Ok(updated)
}

/// Move pending invoices whose due date has passed to `overdue`
pub async fn mark_overdue(db: &DatabaseConnection, today: NaiveDate) -> Result<u64, DomainError> {
    let result = Invoice::update_many()
        .col_expr(
            invoice::Column::Status,
            sea_orm::sea_query::Expr::value(InvoiceStatus::Overdue.as_str()),
        )
        .col_expr(
            invoice::Column::UpdatedAt,
            sea_orm::sea_query::Expr::value(Utc::now().to_rfc3339()),
        )
        .filter(invoice::Column::Status.eq(InvoiceStatus::Pending.as_str()))
        .filter(invoice::Column::DueDate.lt(today.format("%Y-%m-%d").to_string()))
        .exec(db)
        .await?;

    if result.rows_affected > 0 {
        tracing::info!("{} invoice(s) marked overdue", result.rows_affected);
    }
    Ok(result.rows_affected)
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    invoice_number: &'a str,
    billed_to: String,
    amount: String,
    status: &'a str,
    period_start: &'a str,
    period_end: &'a str,
    due_date: &'a str,
    trip_count: usize,
    payment_reference: &'a str,
    created_at: &'a str,
}

fn render_csv(
    invoices: &[invoice::Model],
    facility_names: &HashMap<i32, String>,
    user_names: &HashMap<i32, String>,
) -> Result<String, DomainError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for inv in invoices {
        let billed_to = inv
            .facility_id
            .and_then(|id| facility_names.get(&id).cloned())
            .or_else(|| inv.user_id.and_then(|id| user_names.get(&id).cloned()))
            .unwrap_or_default();

        writer
            .serialize(CsvRow {
                invoice_number: &inv.invoice_number,
                billed_to,
                amount: format!("{:.2}", inv.amount),
                status: &inv.status,
                period_start: inv.period_start.as_deref().unwrap_or_default(),
                period_end: inv.period_end.as_deref().unwrap_or_default(),
                due_date: &inv.due_date,
                trip_count: inv.trip_id_list().len(),
                payment_reference: inv.payment_reference.as_deref().unwrap_or_default(),
                created_at: &inv.created_at,
            })
            .map_err(|e| DomainError::External(format!("CSV error: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| DomainError::External(format!("CSV error: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| DomainError::External(format!("CSV error: {}", e)))
}

pub async fn export_csv(
    db: &DatabaseConnection,
    filter: InvoiceFilter,
) -> Result<String, DomainError> {
    let invoices = list_invoices(db, filter).await?;

    let facility_ids: Vec<i32> = invoices.iter().filter_map(|i| i.facility_id).collect();
    let user_ids: Vec<i32> = invoices.iter().filter_map(|i| i.user_id).collect();

    let mut facility_names = HashMap::new();
    if !facility_ids.is_empty() {
        for f in Facility::find()
            .filter(facility::Column::Id.is_in(facility_ids))
            .all(db)
            .await?
        {
            facility_names.insert(f.id, f.name);
        }
    }

    let mut user_names = HashMap::new();
    if !user_ids.is_empty() {
        for p in Profile::find()
            .filter(profile::Column::Id.is_in(user_ids))
            .all(db)
            .await?
        {
            user_names.insert(p.id, p.full_name());
        }
    }

    render_csv(&invoices, &facility_names, &user_names)
}
