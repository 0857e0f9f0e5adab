use super::common::{created_response, no_content_response, success_response};
use crate::auth::{consts as perm, AuthRouterExt};
use crate::errors::ServiceError;
use crate::models::FinancialTransaction;
use crate::services::analytics::{CashFlowQuery, CategoryQuery, CategoryShare, MonthlyCashFlow};
use crate::services::finance::{PayInput, TransactionFilter, TransactionInput};
use crate::{ApiResponse, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    let read = Router::new()
        .route("/finance/transactions", get(list_transactions))
        .route("/finance/transactions/:id", get(get_transaction))
        .route("/finance/cash-flow", get(cash_flow))
        .route("/finance/categories", get(categories))
        .with_permission(perm::FINANCE_READ);

    let write = Router::new()
        .route("/finance/transactions", post(create_transaction))
        .route(
            "/finance/transactions/:id",
            put(update_transaction).delete(delete_transaction),
        )
        .route("/finance/transactions/:id/pay", post(pay_transaction))
        .route("/finance/transactions/:id/cancel", post(cancel_transaction))
        .with_permission(perm::FINANCE_WRITE);

    read.merge(write)
}

#[utoipa::path(
    get,
    path = "/api/v1/finance/transactions",
    params(TransactionFilter),
    responses(
        (status = 200, description = "Transactions with their effective status", body = ApiResponse<Vec<FinancialTransaction>>),
        (status = 400, description = "Malformed month", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Finance"
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(filter): Query<TransactionFilter>,
) -> Result<Json<ApiResponse<Vec<FinancialTransaction>>>, ServiceError> {
    Ok(success_response(state.services.finance.list(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/finance/transactions/{id}",
    params(("id" = Uuid, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Transaction", body = ApiResponse<FinancialTransaction>),
        (status = 404, description = "Transaction not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Finance"
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<FinancialTransaction>>, ServiceError> {
    Ok(success_response(state.services.finance.get(id).await?))
}

/// Registers a bill payable (expense) or an invoice receivable (income)
#[utoipa::path(
    post,
    path = "/api/v1/finance/transactions",
    request_body = TransactionInput,
    responses(
        (status = 201, description = "Transaction created", body = ApiResponse<FinancialTransaction>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Finance"
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(input): Json<TransactionInput>,
) -> Result<(StatusCode, Json<ApiResponse<FinancialTransaction>>), ServiceError> {
    Ok(created_response(state.services.finance.create(input).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/finance/transactions/{id}",
    params(("id" = Uuid, Path, description = "Transaction id")),
    request_body = TransactionInput,
    responses(
        (status = 200, description = "Transaction updated", body = ApiResponse<FinancialTransaction>),
        (status = 400, description = "Only pending transactions can be edited", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Finance"
)]
pub async fn update_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<TransactionInput>,
) -> Result<Json<ApiResponse<FinancialTransaction>>, ServiceError> {
    Ok(success_response(state.services.finance.update(id, input).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/finance/transactions/{id}/pay",
    params(("id" = Uuid, Path, description = "Transaction id")),
    request_body(content = Option<PayInput>, description = "Payment date and method; both optional"),
    responses(
        (status = 200, description = "Transaction paid", body = ApiResponse<FinancialTransaction>),
        (status = 400, description = "Transaction is not pending", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Finance"
)]
pub async fn pay_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<PayInput>>,
) -> Result<Json<ApiResponse<FinancialTransaction>>, ServiceError> {
    let input = body.map(|Json(input)| input).unwrap_or_default();
    Ok(success_response(state.services.finance.pay(id, input).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/finance/transactions/{id}/cancel",
    params(("id" = Uuid, Path, description = "Transaction id")),
    responses(
        (status = 200, description = "Transaction cancelled", body = ApiResponse<FinancialTransaction>),
        (status = 400, description = "Transaction is not pending", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Finance"
)]
pub async fn cancel_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<FinancialTransaction>>, ServiceError> {
    Ok(success_response(state.services.finance.cancel(id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/finance/transactions/{id}",
    params(("id" = Uuid, Path, description = "Transaction id")),
    responses(
        (status = 204, description = "Transaction deleted"),
        (status = 400, description = "Settled sale receivables are kept", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Finance"
)]
pub async fn delete_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.finance.delete(id).await?;
    Ok(no_content_response())
}

/// Income, expense, net and running balance per month of payment
#[utoipa::path(
    get,
    path = "/api/v1/finance/cash-flow",
    params(CashFlowQuery),
    responses(
        (status = 200, description = "Monthly cash flow", body = ApiResponse<Vec<MonthlyCashFlow>>),
        (status = 400, description = "Malformed month", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Finance"
)]
pub async fn cash_flow(
    State(state): State<AppState>,
    Query(query): Query<CashFlowQuery>,
) -> Result<Json<ApiResponse<Vec<MonthlyCashFlow>>>, ServiceError> {
    Ok(success_response(state.services.analytics.cash_flow(&query).await?))
}

/// Share of each category within one kind
#[utoipa::path(
    get,
    path = "/api/v1/finance/categories",
    params(CategoryQuery),
    responses(
        (status = 200, description = "Category breakdown, largest first", body = ApiResponse<Vec<CategoryShare>>),
        (status = 400, description = "Malformed month", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Finance"
)]
pub async fn categories(
    State(state): State<AppState>,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<ApiResponse<Vec<CategoryShare>>>, ServiceError> {
    Ok(success_response(state.services.analytics.categories(&query).await?))
}
