use super::common::created_response;
use crate::auth::{consts as perm, AuthRouterExt, AuthUser};
use crate::errors::ServiceError;
use crate::services::pos::{CheckoutInput, CheckoutReceipt};
use crate::{ApiResponse, AppState};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::info;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pos/checkout", post(checkout))
        .with_permission(perm::POS_CHECKOUT)
}

/// One-shot register sale: completed order, stock exits, settled receivable
#[utoipa::path(
    post,
    path = "/api/v1/pos/checkout",
    summary = "Point-of-sale checkout",
    request_body = CheckoutInput,
    responses(
        (status = 201, description = "Sale completed", body = ApiResponse<CheckoutReceipt>),
        (status = 400, description = "Empty cart or tendered amount below total", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Point of Sale"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<CheckoutInput>,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutReceipt>>), ServiceError> {
    let receipt = state.services.pos.checkout(input).await?;
    info!(
        order_id = %receipt.order.id,
        cashier = %user.user_id,
        total = %receipt.order.total,
        "POS sale completed"
    );
    Ok(created_response(receipt))
}
