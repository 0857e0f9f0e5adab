use super::common::{created_response, no_content_response, success_response};
use crate::auth::{consts as perm, AuthRouterExt};
use crate::errors::ServiceError;
use crate::models::Supplier;
use crate::services::suppliers::{SupplierFilter, SupplierInput};
use crate::{ApiResponse, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    let read = Router::new()
        .route("/suppliers", get(list_suppliers))
        .route("/suppliers/:id", get(get_supplier))
        .with_permission(perm::SUPPLIERS_READ);

    let write = Router::new()
        .route("/suppliers", axum::routing::post(create_supplier))
        .route(
            "/suppliers/:id",
            axum::routing::put(update_supplier).delete(delete_supplier),
        )
        .with_permission(perm::SUPPLIERS_WRITE);

    read.merge(write)
}

#[utoipa::path(
    get,
    path = "/api/v1/suppliers",
    params(SupplierFilter),
    responses(
        (status = 200, description = "Suppliers, newest first", body = ApiResponse<Vec<Supplier>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Suppliers"
)]
pub async fn list_suppliers(
    State(state): State<AppState>,
    Query(filter): Query<SupplierFilter>,
) -> Result<Json<ApiResponse<Vec<Supplier>>>, ServiceError> {
    Ok(success_response(state.services.suppliers.list(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/suppliers/{id}",
    params(("id" = Uuid, Path, description = "Supplier id")),
    responses(
        (status = 200, description = "Supplier", body = ApiResponse<Supplier>),
        (status = 404, description = "Supplier not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Suppliers"
)]
pub async fn get_supplier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Supplier>>, ServiceError> {
    Ok(success_response(state.services.suppliers.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/suppliers",
    request_body = SupplierInput,
    responses(
        (status = 201, description = "Supplier created", body = ApiResponse<Supplier>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Suppliers"
)]
pub async fn create_supplier(
    State(state): State<AppState>,
    Json(input): Json<SupplierInput>,
) -> Result<(StatusCode, Json<ApiResponse<Supplier>>), ServiceError> {
    Ok(created_response(state.services.suppliers.create(input).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/suppliers/{id}",
    params(("id" = Uuid, Path, description = "Supplier id")),
    request_body = SupplierInput,
    responses(
        (status = 200, description = "Supplier updated", body = ApiResponse<Supplier>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "Supplier not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Suppliers"
)]
pub async fn update_supplier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<SupplierInput>,
) -> Result<Json<ApiResponse<Supplier>>, ServiceError> {
    Ok(success_response(state.services.suppliers.update(id, input).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/suppliers/{id}",
    params(("id" = Uuid, Path, description = "Supplier id")),
    responses(
        (status = 204, description = "Supplier deleted"),
        (status = 404, description = "Supplier not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Suppliers"
)]
pub async fn delete_supplier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.suppliers.delete(id).await?;
    Ok(no_content_response())
}
