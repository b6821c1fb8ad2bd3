use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::auth::DispatcherSession;
use crate::error::ApiError;
use crate::infrastructure::AppState;
use crate::services::dashboard_service;

#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    responses(
        (status = 200, description = "Trip, driver, facility and invoice totals"),
        (status = 401, description = "Missing or invalid session"),
        (status = 403, description = "Dispatcher role required")
    )
)]
pub async fn get_stats(
    State(state): State<AppState>,
    _session: DispatcherSession,
) -> Result<Json<Value>, ApiError> {
    let today = chrono::Utc::now().date_naive();
    let stats = dashboard_service::stats(state.db(), today).await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}
