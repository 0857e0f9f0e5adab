use super::common::success_response;
use crate::auth::{consts as perm, AuthRouterExt};
use crate::errors::ServiceError;
use crate::models::{status_catalog, StatusOption};
use crate::services::analytics::DashboardSummary;
use crate::{ApiResponse, AppState};
use axum::{extract::State, routing::get, Json, Router};
use std::collections::BTreeMap;

pub fn routes() -> Router<AppState> {
    let dashboard = Router::new()
        .route("/dashboard", get(dashboard))
        .with_permission(perm::DASHBOARD_READ);

    let meta = Router::new()
        .route("/meta/statuses", get(statuses))
        .with_auth();

    dashboard.merge(meta)
}

/// Month-over-month sales, pipeline, stock, receivables/payables and agenda
#[utoipa::path(
    get,
    path = "/api/v1/dashboard",
    responses(
        (status = 200, description = "Dashboard summary", body = ApiResponse<DashboardSummary>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Dashboard"
)]
pub async fn dashboard(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DashboardSummary>>, ServiceError> {
    Ok(success_response(state.services.analytics.dashboard().await?))
}

/// Code and label of every status enumeration, keyed by kind
#[utoipa::path(
    get,
    path = "/api/v1/meta/statuses",
    responses(
        (status = 200, description = "Status options per kind", body = ApiResponse<serde_json::Value>)
    ),
    security(("Bearer" = [])),
    tag = "Meta"
)]
pub async fn statuses() -> Json<ApiResponse<BTreeMap<&'static str, Vec<StatusOption>>>> {
    success_response(status_catalog())
}
