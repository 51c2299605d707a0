use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{
    access::Principal,
    entities::sale::PaymentType,
    errors::ApiError,
    handlers::AppState,
    services::sales::{CreateSaleInput, SaleItemInput},
};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get},
    Router,
};
use rust_decimal::Decimal;
use sea_orm::ActiveEnum;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

// Request and response DTOs

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct SaleItemRequest {
    pub product_id: i64,
    #[validate(range(min = 1))]
    pub quantity: i32,
    /// Defaults to the product's current price
    pub unit_price: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSaleRequest {
    pub cashier_employee_id: Option<i64>,
    /// "cash" or "card"
    #[schema(example = "cash")]
    pub payment_type: String,
    pub discount_amount: Option<Decimal>,
    pub vat_rate: Option<Decimal>,
    #[validate(length(min = 1))]
    pub items: Vec<SaleItemRequest>,
}

fn parse_payment_type(raw: &str) -> Result<PaymentType, ApiError> {
    PaymentType::try_from_value(&raw.to_string())
        .map_err(|_| ApiError::ValidationError(format!("unknown payment type '{}'", raw)))
}

// Handler functions

/// Record a sale; stock is checked and deducted atomically
#[utoipa::path(
    post,
    path = "/api/v1/systems/{system_id}/sales",
    request_body = CreateSaleRequest,
    params(("system_id" = i64, Path, description = "System ID")),
    responses(
        (status = 201, description = "Sale completed", body = serde_json::Value),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn create_sale(
    State(state): State<AppState>,
    principal: Principal,
    Path(system_id): Path<i64>,
    Json(payload): Json<CreateSaleRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    let payment_type = parse_payment_type(&payload.payment_type)?;

    let items = payload
        .items
        .into_iter()
        .map(|item| SaleItemInput {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            discount_amount: item.discount_amount,
        })
        .collect();

    let result = state
        .services
        .sales
        .create_sale(
            &principal,
            system_id,
            CreateSaleInput {
                cashier_employee_id: payload.cashier_employee_id,
                payment_type,
                discount_amount: payload.discount_amount,
                vat_rate: payload.vat_rate,
                items,
            },
        )
        .await
        .map_err(map_service_error)?;

    info!("Sale {} completed in system {}", result.sale.id, system_id);
    Ok(created_response(result))
}

/// List sales, newest first
#[utoipa::path(
    get,
    path = "/api/v1/systems/{system_id}/sales",
    params(("system_id" = i64, Path, description = "System ID")),
    responses(
        (status = 200, description = "Sales", body = serde_json::Value)
    ),
    tag = "sales"
)]
pub async fn list_sales(
    State(state): State<AppState>,
    principal: Principal,
    Path(system_id): Path<i64>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let sales = state
        .services
        .sales
        .list_sales(&principal, system_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(sales))
}

/// Get one sale with its items
#[utoipa::path(
    get,
    path = "/api/v1/systems/{system_id}/sales/{sale_id}",
    params(
        ("system_id" = i64, Path, description = "System ID"),
        ("sale_id" = i64, Path, description = "Sale ID")
    ),
    responses(
        (status = 200, description = "Sale fetched", body = serde_json::Value),
        (status = 404, description = "Sale not found", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn get_sale(
    State(state): State<AppState>,
    principal: Principal,
    Path((system_id, sale_id)): Path<(i64, i64)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let sale = state
        .services
        .sales
        .get_sale(&principal, system_id, sale_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(sale))
}

/// Void a whole sale, restoring stock
#[utoipa::path(
    delete,
    path = "/api/v1/systems/{system_id}/sales/{sale_id}",
    params(
        ("system_id" = i64, Path, description = "System ID"),
        ("sale_id" = i64, Path, description = "Sale ID")
    ),
    responses(
        (status = 204, description = "Sale voided"),
        (status = 404, description = "Sale not found", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn void_sale(
    State(state): State<AppState>,
    principal: Principal,
    Path((system_id, sale_id)): Path<(i64, i64)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .sales
        .void_sale(&principal, system_id, sale_id)
        .await
        .map_err(map_service_error)?;

    info!("Sale {} voided", sale_id);
    Ok(no_content_response())
}

/// Void one sale item, restoring exactly the batches it consumed
#[utoipa::path(
    delete,
    path = "/api/v1/systems/{system_id}/sales/{sale_id}/items/{item_id}",
    params(
        ("system_id" = i64, Path, description = "System ID"),
        ("sale_id" = i64, Path, description = "Sale ID"),
        ("item_id" = i64, Path, description = "Sale item ID")
    ),
    responses(
        (status = 200, description = "Item voided; sale re-totalled", body = serde_json::Value),
        (status = 404, description = "Sale item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn void_sale_item(
    State(state): State<AppState>,
    principal: Principal,
    Path((system_id, sale_id, item_id)): Path<(i64, i64, i64)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let sale = state
        .services
        .sales
        .void_sale_item(&principal, system_id, sale_id, item_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(sale))
}

/// Creates the router for sale endpoints (nested under a system)
pub fn sale_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sales).post(create_sale))
        .route("/:sale_id", get(get_sale).delete(void_sale))
        .route("/:sale_id/items/:item_id", delete(void_sale_item))
}
