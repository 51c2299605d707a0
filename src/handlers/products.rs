use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{
    access::Principal,
    errors::ApiError,
    handlers::AppState,
    services::products::{CreateProductInput, UpdateProductInput},
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::get,
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

// Request and response DTOs

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub price: Decimal,
    pub cost: Option<Decimal>,
    pub minimum_stock: Option<i32>,
    pub category: Option<String>,
    pub discount_percentage: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub minimum_stock: Option<i32>,
    pub category: Option<String>,
    pub discount_percentage: Option<Decimal>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListProductsParams {
    /// Filter by name substring
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ExpiringParams {
    /// Horizon in days (default 30)
    pub days: Option<i64>,
}

// Handler functions

/// Create a product (barcode is generated server-side)
#[utoipa::path(
    post,
    path = "/api/v1/systems/{system_id}/products",
    request_body = CreateProductRequest,
    params(("system_id" = i64, Path, description = "System ID")),
    responses(
        (status = 201, description = "Product created", body = serde_json::Value),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    principal: Principal,
    Path(system_id): Path<i64>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let product = state
        .services
        .products
        .create_product(
            &principal,
            system_id,
            CreateProductInput {
                name: payload.name,
                price: payload.price,
                cost: payload.cost,
                minimum_stock: payload.minimum_stock,
                category: payload.category,
                discount_percentage: payload.discount_percentage,
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(created_response(product))
}

/// List products, optionally filtered by name
#[utoipa::path(
    get,
    path = "/api/v1/systems/{system_id}/products",
    params(("system_id" = i64, Path, description = "System ID"), ListProductsParams),
    responses(
        (status = 200, description = "Products", body = serde_json::Value)
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    principal: Principal,
    Path(system_id): Path<i64>,
    Query(params): Query<ListProductsParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let products = state
        .services
        .products
        .list_products(&principal, system_id, params.search)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(products))
}

/// Get one product
#[utoipa::path(
    get,
    path = "/api/v1/systems/{system_id}/products/{product_id}",
    params(
        ("system_id" = i64, Path, description = "System ID"),
        ("product_id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product fetched", body = serde_json::Value),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    principal: Principal,
    Path((system_id, product_id)): Path<(i64, i64)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .get_product(&principal, system_id, product_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

/// Update a product
#[utoipa::path(
    put,
    path = "/api/v1/systems/{system_id}/products/{product_id}",
    request_body = UpdateProductRequest,
    params(
        ("system_id" = i64, Path, description = "System ID"),
        ("product_id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product updated", body = serde_json::Value),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    principal: Principal,
    Path((system_id, product_id)): Path<(i64, i64)>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let product = state
        .services
        .products
        .update_product(
            &principal,
            system_id,
            product_id,
            UpdateProductInput {
                name: payload.name,
                price: payload.price,
                cost: payload.cost,
                minimum_stock: payload.minimum_stock,
                category: payload.category,
                discount_percentage: payload.discount_percentage,
            },
        )
        .await
        .map_err(map_service_error)?;
    Ok(success_response(product))
}

/// Delete a product
#[utoipa::path(
    delete,
    path = "/api/v1/systems/{system_id}/products/{product_id}",
    params(
        ("system_id" = i64, Path, description = "System ID"),
        ("product_id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    principal: Principal,
    Path((system_id, product_id)): Path<(i64, i64)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .products
        .delete_product(&principal, system_id, product_id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

/// Products below their minimum stock
#[utoipa::path(
    get,
    path = "/api/v1/systems/{system_id}/products/low-stock",
    params(("system_id" = i64, Path, description = "System ID")),
    responses(
        (status = 200, description = "Low stock products", body = serde_json::Value)
    ),
    tag = "products"
)]
pub async fn low_stock(
    State(state): State<AppState>,
    principal: Principal,
    Path(system_id): Path<i64>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let products = state
        .services
        .products
        .low_stock(&principal, system_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(products))
}

/// Products expiring within the given horizon
#[utoipa::path(
    get,
    path = "/api/v1/systems/{system_id}/products/expiring",
    params(("system_id" = i64, Path, description = "System ID"), ExpiringParams),
    responses(
        (status = 200, description = "Expiring products", body = serde_json::Value)
    ),
    tag = "products"
)]
pub async fn expiring_soon(
    State(state): State<AppState>,
    principal: Principal,
    Path(system_id): Path<i64>,
    Query(params): Query<ExpiringParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let products = state
        .services
        .products
        .expiring_soon(&principal, system_id, params.days.unwrap_or(30))
        .await
        .map_err(map_service_error)?;
    Ok(success_response(products))
}

/// Products whose stock has already expired
#[utoipa::path(
    get,
    path = "/api/v1/systems/{system_id}/products/expired",
    params(("system_id" = i64, Path, description = "System ID")),
    responses(
        (status = 200, description = "Expired products", body = serde_json::Value)
    ),
    tag = "products"
)]
pub async fn expired(
    State(state): State<AppState>,
    principal: Principal,
    Path(system_id): Path<i64>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let products = state
        .services
        .products
        .expired(&principal, system_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(products))
}

/// A product's stock grouped by batch expiry
#[utoipa::path(
    get,
    path = "/api/v1/systems/{system_id}/products/{product_id}/stock-by-expiry",
    params(
        ("system_id" = i64, Path, description = "System ID"),
        ("product_id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Expiry buckets", body = serde_json::Value)
    ),
    tag = "products"
)]
pub async fn stock_by_expiry(
    State(state): State<AppState>,
    principal: Principal,
    Path((system_id, product_id)): Path<(i64, i64)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let buckets = state
        .services
        .products
        .stock_by_expiry(&principal, system_id, product_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(buckets))
}

/// A product's received stock grouped by receipt age
#[utoipa::path(
    get,
    path = "/api/v1/systems/{system_id}/products/{product_id}/stock-by-age",
    params(
        ("system_id" = i64, Path, description = "System ID"),
        ("product_id" = i64, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Age buckets", body = serde_json::Value)
    ),
    tag = "products"
)]
pub async fn stock_by_age(
    State(state): State<AppState>,
    principal: Principal,
    Path((system_id, product_id)): Path<(i64, i64)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let buckets = state
        .services
        .products
        .stock_by_age(&principal, system_id, product_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(buckets))
}

/// Creates the router for product endpoints (nested under a system)
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/low-stock", get(low_stock))
        .route("/expiring", get(expiring_soon))
        .route("/expired", get(expired))
        .route(
            "/:product_id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/:product_id/stock-by-expiry", get(stock_by_expiry))
        .route("/:product_id/stock-by-age", get(stock_by_age))
}
