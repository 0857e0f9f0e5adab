use super::common::{created_response, no_content_response, success_response};
use crate::auth::{consts as perm, AuthRouterExt};
use crate::errors::ServiceError;
use crate::models::Product;
use crate::services::products::{ProductFilter, ProductInput};
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
        .route("/products", get(list_products))
        .route("/products/low-stock", get(list_low_stock))
        .route("/products/:id", get(get_product))
        .with_permission(perm::PRODUCTS_READ);

    let write = Router::new()
        .route("/products", axum::routing::post(create_product))
        .route(
            "/products/:id",
            axum::routing::put(update_product).delete(delete_product),
        )
        .with_permission(perm::PRODUCTS_WRITE);

    read.merge(write)
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductFilter),
    responses(
        (status = 200, description = "Products, newest first", body = ApiResponse<Vec<Product>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<ApiResponse<Vec<Product>>>, ServiceError> {
    Ok(success_response(state.services.products.list(&filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = ApiResponse<Product>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Product>>, ServiceError> {
    Ok(success_response(state.services.products.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = ProductInput,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<Product>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 409, description = "SKU already in use", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<ApiResponse<Product>>), ServiceError> {
    Ok(created_response(state.services.products.create(input).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = ProductInput,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<Product>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<ProductInput>,
) -> Result<Json<ApiResponse<Product>>, ServiceError> {
    Ok(success_response(state.services.products.update(id, input).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.products.delete(id).await?;
    Ok(no_content_response())
}

/// Products at or below their minimum stock
#[utoipa::path(
    get,
    path = "/api/v1/products/low-stock",
    responses(
        (status = 200, description = "Products needing replenishment", body = ApiResponse<Vec<Product>>)
    ),
    security(("Bearer" = [])),
    tag = "Products"
)]
pub async fn list_low_stock(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Product>>>, ServiceError> {
    Ok(success_response(state.services.products.low_stock().await?))
}
