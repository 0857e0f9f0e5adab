use super::common::{created_response, success_response};
use crate::auth::{consts as perm, AuthRouterExt};
use crate::errors::ServiceError;
use crate::models::StockMovement;
use crate::services::stock::{MovementFilter, MovementInput};
use crate::{ApiResponse, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    let read = Router::new()
        .route("/stock/movements", get(list_movements))
        .route("/stock/movements/:id", get(get_movement))
        .route("/products/:id/stock-history", get(product_history))
        .with_permission(perm::STOCK_READ);

    let write = Router::new()
        .route("/stock/movements", post(record_movement))
        .route("/stock/movements/:id/reverse", post(reverse_movement))
        .with_permission(perm::STOCK_WRITE);

    read.merge(write)
}

#[utoipa::path(
    get,
    path = "/api/v1/stock/movements",
    params(MovementFilter),
    responses(
        (status = 200, description = "Stock movements, newest first", body = ApiResponse<Vec<StockMovement>>)
    ),
    security(("Bearer" = [])),
    tag = "Stock"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    Query(filter): Query<MovementFilter>,
) -> Result<Json<ApiResponse<Vec<StockMovement>>>, ServiceError> {
    Ok(success_response(state.services.stock.list(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock/movements/{id}",
    params(("id" = Uuid, Path, description = "Movement id")),
    responses(
        (status = 200, description = "Stock movement", body = ApiResponse<StockMovement>),
        (status = 404, description = "Movement not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Stock"
)]
pub async fn get_movement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<StockMovement>>, ServiceError> {
    Ok(success_response(state.services.stock.get(id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}/stock-history",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Movements of one product", body = ApiResponse<Vec<StockMovement>>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Stock"
)]
pub async fn product_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<StockMovement>>>, ServiceError> {
    Ok(success_response(state.services.stock.history(id).await?))
}

/// Records an entry, exit or absolute adjustment
#[utoipa::path(
    post,
    path = "/api/v1/stock/movements",
    request_body = MovementInput,
    responses(
        (status = 201, description = "Movement recorded", body = ApiResponse<StockMovement>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 422, description = "Stock would go negative", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Stock"
)]
pub async fn record_movement(
    State(state): State<AppState>,
    Json(input): Json<MovementInput>,
) -> Result<(StatusCode, Json<ApiResponse<StockMovement>>), ServiceError> {
    Ok(created_response(state.services.stock.record(input).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/stock/movements/{id}/reverse",
    params(("id" = Uuid, Path, description = "Movement id")),
    responses(
        (status = 200, description = "Movement reversed", body = ApiResponse<StockMovement>),
        (status = 400, description = "Movement already reversed", body = crate::errors::ErrorResponse),
        (status = 422, description = "Stock would go negative", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Stock"
)]
pub async fn reverse_movement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<StockMovement>>, ServiceError> {
    Ok(success_response(state.services.stock.reverse(id).await?))
}
