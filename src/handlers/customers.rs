use super::common::{created_response, no_content_response, success_response};
use crate::auth::{consts as perm, AuthRouterExt};
use crate::errors::ServiceError;
use crate::models::{Address, Customer};
use crate::services::customers::{CustomerFilter, CustomerInput};
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
        .route("/customers", get(list_customers))
        .route("/customers/:id", get(get_customer))
        .route("/customers/postal-code/:code", get(lookup_postal_code))
        .with_permission(perm::CUSTOMERS_READ);

    let write = Router::new()
        .route("/customers", axum::routing::post(create_customer))
        .route(
            "/customers/:id",
            axum::routing::put(update_customer).delete(delete_customer),
        )
        .with_permission(perm::CUSTOMERS_WRITE);

    read.merge(write)
}

#[utoipa::path(
    get,
    path = "/api/v1/customers",
    params(CustomerFilter),
    responses(
        (status = 200, description = "Customers, newest first", body = ApiResponse<Vec<Customer>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Customers"
)]
pub async fn list_customers(
    State(state): State<AppState>,
    Query(filter): Query<CustomerFilter>,
) -> Result<Json<ApiResponse<Vec<Customer>>>, ServiceError> {
    Ok(success_response(state.services.customers.list(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Customer", body = ApiResponse<Customer>),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Customers"
)]
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Customer>>, ServiceError> {
    Ok(success_response(state.services.customers.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/customers",
    request_body = CustomerInput,
    responses(
        (status = 201, description = "Customer created", body = ApiResponse<Customer>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 409, description = "Tax id already registered", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Customers"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    Json(input): Json<CustomerInput>,
) -> Result<(StatusCode, Json<ApiResponse<Customer>>), ServiceError> {
    Ok(created_response(state.services.customers.create(input).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer id")),
    request_body = CustomerInput,
    responses(
        (status = 200, description = "Customer updated", body = ApiResponse<Customer>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Customers"
)]
pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<CustomerInput>,
) -> Result<Json<ApiResponse<Customer>>, ServiceError> {
    Ok(success_response(state.services.customers.update(id, input).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/customers/{id}",
    params(("id" = Uuid, Path, description = "Customer id")),
    responses(
        (status = 204, description = "Customer deleted"),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Customers"
)]
pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.customers.delete(id).await?;
    Ok(no_content_response())
}

/// Address suggestion for a postal code
#[utoipa::path(
    get,
    path = "/api/v1/customers/postal-code/{code}",
    params(("code" = String, Path, description = "Postal code, with or without the dash")),
    responses(
        (status = 200, description = "Address found", body = ApiResponse<Address>),
        (status = 400, description = "Malformed postal code", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown postal code", body = crate::errors::ErrorResponse),
        (status = 502, description = "Lookup service unavailable", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Customers"
)]
pub async fn lookup_postal_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ApiResponse<Address>>, ServiceError> {
    Ok(success_response(
        state.services.customers.lookup_postal_code(&code).await?,
    ))
}
