use super::common::{created_response, no_content_response, success_response};
use crate::auth::{consts as perm, AuthRouterExt};
use crate::errors::ServiceError;
use crate::models::Quote;
use crate::services::quotes::{ConversionResult, QuoteFilter, QuoteInput};
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
        .route("/quotes", get(list_quotes))
        .route("/quotes/:id", get(get_quote))
        .with_permission(perm::QUOTES_READ);

    let write = Router::new()
        .route("/quotes", post(create_quote))
        .route("/quotes/:id", put(update_quote).delete(delete_quote))
        .route("/quotes/:id/send", post(send_quote))
        .route("/quotes/:id/accept", post(accept_quote))
        .route("/quotes/:id/reject", post(reject_quote))
        .route("/quotes/:id/convert", post(convert_quote))
        .with_permission(perm::QUOTES_WRITE);

    read.merge(write)
}

#[utoipa::path(
    get,
    path = "/api/v1/quotes",
    params(QuoteFilter),
    responses(
        (status = 200, description = "Quotes with their effective status", body = ApiResponse<Vec<Quote>>)
    ),
    security(("Bearer" = [])),
    tag = "Quotes"
)]
pub async fn list_quotes(
    State(state): State<AppState>,
    Query(filter): Query<QuoteFilter>,
) -> Result<Json<ApiResponse<Vec<Quote>>>, ServiceError> {
    Ok(success_response(state.services.quotes.list(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/quotes/{id}",
    params(("id" = Uuid, Path, description = "Quote id")),
    responses(
        (status = 200, description = "Quote", body = ApiResponse<Quote>),
        (status = 404, description = "Quote not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Quotes"
)]
pub async fn get_quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Quote>>, ServiceError> {
    Ok(success_response(state.services.quotes.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/quotes",
    request_body = QuoteInput,
    responses(
        (status = 201, description = "Draft quote created", body = ApiResponse<Quote>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Quotes"
)]
pub async fn create_quote(
    State(state): State<AppState>,
    Json(input): Json<QuoteInput>,
) -> Result<(StatusCode, Json<ApiResponse<Quote>>), ServiceError> {
    Ok(created_response(state.services.quotes.create(input).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/quotes/{id}",
    params(("id" = Uuid, Path, description = "Quote id")),
    request_body = QuoteInput,
    responses(
        (status = 200, description = "Quote updated", body = ApiResponse<Quote>),
        (status = 400, description = "Quote is no longer open", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Quotes"
)]
pub async fn update_quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<QuoteInput>,
) -> Result<Json<ApiResponse<Quote>>, ServiceError> {
    Ok(success_response(state.services.quotes.update(id, input).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/quotes/{id}/send",
    params(("id" = Uuid, Path, description = "Quote id")),
    responses(
        (status = 200, description = "Quote sent", body = ApiResponse<Quote>),
        (status = 400, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Quotes"
)]
pub async fn send_quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Quote>>, ServiceError> {
    Ok(success_response(state.services.quotes.send(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/quotes/{id}/accept",
    params(("id" = Uuid, Path, description = "Quote id")),
    responses(
        (status = 200, description = "Quote accepted", body = ApiResponse<Quote>),
        (status = 400, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Quotes"
)]
pub async fn accept_quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Quote>>, ServiceError> {
    Ok(success_response(state.services.quotes.accept(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/quotes/{id}/reject",
    params(("id" = Uuid, Path, description = "Quote id")),
    responses(
        (status = 200, description = "Quote rejected", body = ApiResponse<Quote>),
        (status = 400, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Quotes"
)]
pub async fn reject_quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Quote>>, ServiceError> {
    Ok(success_response(state.services.quotes.reject(id).await?))
}

/// Turns an accepted quote into a pending order
#[utoipa::path(
    post,
    path = "/api/v1/quotes/{id}/convert",
    params(("id" = Uuid, Path, description = "Quote id")),
    responses(
        (status = 201, description = "Order created from the quote", body = ApiResponse<ConversionResult>),
        (status = 400, description = "Only accepted quotes can be converted", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Quotes"
)]
pub async fn convert_quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<ApiResponse<ConversionResult>>), ServiceError> {
    Ok(created_response(state.services.quotes.convert(id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/quotes/{id}",
    params(("id" = Uuid, Path, description = "Quote id")),
    responses(
        (status = 204, description = "Quote deleted"),
        (status = 404, description = "Quote not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Quotes"
)]
pub async fn delete_quote(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.quotes.delete(id).await?;
    Ok(no_content_response())
}
