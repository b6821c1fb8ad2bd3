use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::auth::{DispatcherSession, Session};
use crate::error::ApiError;
use crate::infrastructure::AppState;
use crate::services::invoice_service::{self, GenerateInvoice, InvoiceFilter, ManualInvoice};

pub async fn list_invoices(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiQuery(filter): ApiQuery<InvoiceFilter>,
) -> Result<Json<Value>, ApiError> {
    let invoices = invoice_service::list_invoices(state.db(), filter).await?;
    Ok(Json(json!({ "success": true, "invoices": invoices })))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Value>, ApiError> {
    let invoice = invoice_service::get_invoice(state.db(), id).await?;
    Ok(Json(json!({ "success": true, "invoice": invoice })))
}

#[utoipa::path(
    post,
    path = "/api/invoices/generate",
    responses(
        (status = 201, description = "Invoice created for the facility's completed trips"),
        (status = 400, description = "Bad period or no billable trips"),
        (status = 404, description = "Facility not found")
    )
)]
pub async fn generate_invoice(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiJson(payload): ApiJson<GenerateInvoice>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let invoice = invoice_service::generate_facility_invoice(state.db(), payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "invoice": invoice })),
    ))
}

pub async fn create_invoice(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiJson(payload): ApiJson<ManualInvoice>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let invoice = invoice_service::create_manual_invoice(state.db(), payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "invoice": invoice })),
    ))
}

#[derive(Deserialize)]
pub struct StatusRequest {
    status: String,
}

pub async fn update_invoice_status(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<StatusRequest>,
) -> Result<Json<Value>, ApiError> {
    let invoice = invoice_service::update_status(state.db(), id, &payload.status).await?;
    Ok(Json(json!({ "success": true, "invoice": invoice })))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<Value>, ApiError> {
    invoice_service::delete_invoice(state.db(), id).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
pub struct ClaimRequest {
    payment_reference: String,
}

/// Facility staff or the billed client report a payment made outside the platform
pub async fn claim_payment(
    State(state): State<AppState>,
    session: Session,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<ClaimRequest>,
) -> Result<Json<Value>, ApiError> {
    let invoice =
        invoice_service::claim_payment(state.db(), id, &payload.payment_reference, &session.profile)
            .await?;
    Ok(Json(json!({ "success": true, "invoice": invoice })))
}

pub async fn list_pending_verification(
    State(state): State<AppState>,
    _session: DispatcherSession,
) -> Result<Json<Value>, ApiError> {
    let invoices = invoice_service::pending_verification(state.db()).await?;
    Ok(Json(json!({
        "success": true,
        "total": invoices.len(),
        "invoices": invoices
    })))
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    approved: bool,
    notes: Option<String>,
}

pub async fn verify_payment(
    State(state): State<AppState>,
    session: DispatcherSession,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<VerifyRequest>,
) -> Result<Json<Value>, ApiError> {
    let invoice = invoice_service::verify_payment(
        state.db(),
        id,
        payload.approved,
        payload.notes,
        session.profile_id(),
    )
    .await?;
    Ok(Json(json!({ "success": true, "invoice": invoice })))
}

pub async fn export_invoices(
    State(state): State<AppState>,
    _session: DispatcherSession,
    ApiQuery(filter): ApiQuery<InvoiceFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let csv = invoice_service::export_csv(state.db(), filter).await?;

    let filename = format!(
        "invoices_{}.csv",
        chrono::Utc::now().format("%Y-%m-%d")
    );
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    Ok((StatusCode::OK, headers, csv))
}

pub async fn mark_overdue(
    State(state): State<AppState>,
    _session: DispatcherSession,
) -> Result<Json<Value>, ApiError> {
    let today = chrono::Utc::now().date_naive();
    let updated = invoice_service::mark_overdue(state.db(), today).await?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}
