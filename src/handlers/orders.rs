use super::common::{created_response, no_content_response, success_response};
use crate::auth::{consts as perm, AuthRouterExt};
use crate::errors::ServiceError;
use crate::models::Order;
use crate::services::sales::{OrderFilter, OrderInput, StatusChange};
use crate::{ApiResponse, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::info;
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    let read = Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order))
        .with_permission(perm::SALES_READ);

    let write = Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", put(update_order).delete(delete_order))
        .route("/orders/:id/status", put(update_order_status))
        .with_permission(perm::SALES_WRITE);

    read.merge(write)
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    params(OrderFilter),
    responses(
        (status = 200, description = "Orders, newest first", body = ApiResponse<Vec<Order>>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<ApiResponse<Vec<Order>>>, ServiceError> {
    Ok(success_response(state.services.sales.list(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order", body = ApiResponse<Order>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Order>>, ServiceError> {
    Ok(success_response(state.services.sales.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    description = "Creates a pending order. Line totals, subtotal and total are computed server side.",
    request_body = OrderInput,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<Order>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(input): Json<OrderInput>,
) -> Result<(StatusCode, Json<ApiResponse<Order>>), ServiceError> {
    let order = state.services.sales.create(input).await?;
    info!(order_id = %order.id, number = %order.number, "Order created");
    Ok(created_response(order))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}",
    summary = "Replace order contents",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = OrderInput,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<Order>),
        (status = 400, description = "Invalid input or order already closed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<OrderInput>,
) -> Result<Json<ApiResponse<Order>>, ServiceError> {
    Ok(success_response(state.services.sales.update(id, input).await?))
}

/// Moves an order through its lifecycle. Completing writes the stock exits
/// and the receivable; cancelling a completed order reverses them.
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    summary = "Change order status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = StatusChange,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<Order>),
        (status = 400, description = "Transition not allowed", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(change): Json<StatusChange>,
) -> Result<Json<ApiResponse<Order>>, ServiceError> {
    Ok(success_response(
        state.services.sales.change_status(id, change.status).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    summary = "Delete order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 400, description = "Completed orders cannot be deleted", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.sales.delete(id).await?;
    Ok(no_content_response())
}
