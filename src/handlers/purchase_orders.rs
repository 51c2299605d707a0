use super::common::{created_response, map_service_error, success_response, validate_input};
use crate::{
    access::Principal,
    entities::purchase_order::PurchaseOrderStatus,
    errors::ApiError,
    handlers::AppState,
    services::{
        procurement::CreatePurchaseOrderInput,
        receiving::{RecordReceiptInput, UpdateReceiptInput},
    },
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, post, put},
    Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::ActiveEnum;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

// Request and response DTOs

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePurchaseOrderRequest {
    pub supplier_id: i64,
    pub product_id: i64,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub cost: Decimal,
    /// ISO date; defaults to seven days from today
    #[schema(example = "2025-06-16")]
    pub expected_delivery_date: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListPurchaseOrdersParams {
    /// Filter by status: pending, partially_received, completed, cancelled
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RecordReceiptRequest {
    #[validate(range(min = 1))]
    pub received_quantity: i32,
    /// ISO date; defaults to today
    pub received_date: Option<String>,
    /// ISO date; omitted for non-perishables
    pub expiry_date: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateReceiptRequest {
    #[validate(range(min = 1))]
    pub received_quantity: Option<i32>,
    pub received_date: Option<String>,
    pub expiry_date: Option<String>,
    pub location: Option<String>,
}

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| ApiError::ValidationError(format!("invalid {} date: {}", field, e)))
}

fn parse_status(raw: &str) -> Result<PurchaseOrderStatus, ApiError> {
    PurchaseOrderStatus::try_from_value(&raw.to_string())
        .map_err(|_| ApiError::ValidationError(format!("unknown purchase order status '{}'", raw)))
}

// Handler functions

/// Create a purchase order
#[utoipa::path(
    post,
    path = "/api/v1/systems/{system_id}/purchase-orders",
    request_body = CreatePurchaseOrderRequest,
    params(("system_id" = i64, Path, description = "System ID")),
    responses(
        (status = 201, description = "Purchase order created", body = serde_json::Value),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn create_purchase_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(system_id): Path<i64>,
    Json(payload): Json<CreatePurchaseOrderRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    let expected_delivery_date = payload
        .expected_delivery_date
        .as_deref()
        .map(|raw| parse_date(raw, "expected_delivery"))
        .transpose()?;

    let order = state
        .services
        .purchase_orders
        .create_purchase_order(
            &principal,
            system_id,
            CreatePurchaseOrderInput {
                supplier_id: payload.supplier_id,
                product_id: payload.product_id,
                quantity: payload.quantity,
                cost: payload.cost,
                expected_delivery_date,
            },
        )
        .await
        .map_err(map_service_error)?;

    info!("Purchase order created: {}", order.id);
    Ok(created_response(order))
}

/// List purchase orders, optionally by status
#[utoipa::path(
    get,
    path = "/api/v1/systems/{system_id}/purchase-orders",
    params(("system_id" = i64, Path, description = "System ID"), ListPurchaseOrdersParams),
    responses(
        (status = 200, description = "Purchase orders", body = serde_json::Value)
    ),
    tag = "purchase-orders"
)]
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    principal: Principal,
    Path(system_id): Path<i64>,
    Query(params): Query<ListPurchaseOrdersParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let status = params.status.as_deref().map(parse_status).transpose()?;

    let orders = state
        .services
        .purchase_orders
        .list_purchase_orders(&principal, system_id, status)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(orders))
}

/// Get one purchase order
#[utoipa::path(
    get,
    path = "/api/v1/systems/{system_id}/purchase-orders/{po_id}",
    params(
        ("system_id" = i64, Path, description = "System ID"),
        ("po_id" = i64, Path, description = "Purchase order ID")
    ),
    responses(
        (status = 200, description = "Purchase order fetched", body = serde_json::Value),
        (status = 404, description = "Purchase order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn get_purchase_order(
    State(state): State<AppState>,
    principal: Principal,
    Path((system_id, po_id)): Path<(i64, i64)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .purchase_orders
        .get_purchase_order(&principal, system_id, po_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(order))
}

/// Cancel a purchase order (terminal)
#[utoipa::path(
    post,
    path = "/api/v1/systems/{system_id}/purchase-orders/{po_id}/cancel",
    params(
        ("system_id" = i64, Path, description = "System ID"),
        ("po_id" = i64, Path, description = "Purchase order ID")
    ),
    responses(
        (status = 200, description = "Purchase order cancelled", body = serde_json::Value),
        (status = 400, description = "Already cancelled", body = crate::errors::ErrorResponse)
    ),
    tag = "purchase-orders"
)]
pub async fn cancel_purchase_order(
    State(state): State<AppState>,
    principal: Principal,
    Path((system_id, po_id)): Path<(i64, i64)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .purchase_orders
        .cancel_purchase_order(&principal, system_id, po_id)
        .await
        .map_err(map_service_error)?;

    info!("Purchase order cancelled: {}", po_id);
    Ok(success_response(order))
}

/// Record a goods receipt against a purchase order
#[utoipa::path(
    post,
    path = "/api/v1/systems/{system_id}/purchase-orders/{po_id}/receipts",
    request_body = RecordReceiptRequest,
    params(
        ("system_id" = i64, Path, description = "System ID"),
        ("po_id" = i64, Path, description = "Purchase order ID")
    ),
    responses(
        (status = 201, description = "Receipt recorded with updated stock and status", body = serde_json::Value),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "goods-receiving"
)]
pub async fn record_receipt(
    State(state): State<AppState>,
    principal: Principal,
    Path((system_id, po_id)): Path<(i64, i64)>,
    Json(payload): Json<RecordReceiptRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    let received_date = payload
        .received_date
        .as_deref()
        .map(|raw| parse_date(raw, "received"))
        .transpose()?;
    let expiry_date = payload
        .expiry_date
        .as_deref()
        .map(|raw| parse_date(raw, "expiry"))
        .transpose()?;

    let outcome = state
        .services
        .receiving
        .record_receipt(
            &principal,
            system_id,
            po_id,
            RecordReceiptInput {
                received_quantity: payload.received_quantity,
                received_date,
                expiry_date,
                location: payload.location,
            },
        )
        .await
        .map_err(map_service_error)?;

    info!(
        "Goods receipt {} recorded against purchase order {}",
        outcome.receipt.id, po_id
    );
    Ok(created_response(outcome))
}

/// List receipts for a purchase order
#[utoipa::path(
    get,
    path = "/api/v1/systems/{system_id}/purchase-orders/{po_id}/receipts",
    params(
        ("system_id" = i64, Path, description = "System ID"),
        ("po_id" = i64, Path, description = "Purchase order ID")
    ),
    responses(
        (status = 200, description = "Receipts", body = serde_json::Value)
    ),
    tag = "goods-receiving"
)]
pub async fn list_receipts(
    State(state): State<AppState>,
    principal: Principal,
    Path((system_id, po_id)): Path<(i64, i64)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let receipts = state
        .services
        .receiving
        .list_receipts(&principal, system_id, po_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(receipts))
}

/// Correct a goods receipt
#[utoipa::path(
    put,
    path = "/api/v1/systems/{system_id}/goods-receipts/{receipt_id}",
    request_body = UpdateReceiptRequest,
    params(
        ("system_id" = i64, Path, description = "System ID"),
        ("receipt_id" = i64, Path, description = "Goods receipt ID")
    ),
    responses(
        (status = 200, description = "Receipt updated with reconciled stock", body = serde_json::Value),
        (status = 409, description = "Received stock already sold", body = crate::errors::ErrorResponse)
    ),
    tag = "goods-receiving"
)]
pub async fn update_receipt(
    State(state): State<AppState>,
    principal: Principal,
    Path((system_id, receipt_id)): Path<(i64, i64)>,
    Json(payload): Json<UpdateReceiptRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    let received_date = payload
        .received_date
        .as_deref()
        .map(|raw| parse_date(raw, "received"))
        .transpose()?;
    let expiry_date = payload
        .expiry_date
        .as_deref()
        .map(|raw| parse_date(raw, "expiry"))
        .transpose()?;

    let outcome = state
        .services
        .receiving
        .update_receipt(
            &principal,
            system_id,
            receipt_id,
            UpdateReceiptInput {
                received_quantity: payload.received_quantity,
                received_date,
                expiry_date,
                location: payload.location,
            },
        )
        .await
        .map_err(map_service_error)?;
    Ok(success_response(outcome))
}

/// Delete a goods receipt, reversing its stock effect
#[utoipa::path(
    delete,
    path = "/api/v1/systems/{system_id}/goods-receipts/{receipt_id}",
    params(
        ("system_id" = i64, Path, description = "System ID"),
        ("receipt_id" = i64, Path, description = "Goods receipt ID")
    ),
    responses(
        (status = 200, description = "Receipt deleted with reconciled stock", body = serde_json::Value),
        (status = 409, description = "Received stock already sold", body = crate::errors::ErrorResponse)
    ),
    tag = "goods-receiving"
)]
pub async fn delete_receipt(
    State(state): State<AppState>,
    principal: Principal,
    Path((system_id, receipt_id)): Path<(i64, i64)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let outcome = state
        .services
        .receiving
        .delete_receipt(&principal, system_id, receipt_id)
        .await
        .map_err(map_service_error)?;

    info!("Goods receipt {} deleted", receipt_id);
    Ok(success_response(outcome))
}

/// Creates the router for purchase order endpoints (nested under a system)
pub fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_purchase_order))
        .route("/", get(list_purchase_orders))
        .route("/:po_id", get(get_purchase_order))
        .route("/:po_id/cancel", post(cancel_purchase_order))
        .route("/:po_id/receipts", post(record_receipt))
        .route("/:po_id/receipts", get(list_receipts))
}

/// Creates the router for receipt correction endpoints (nested under a system)
pub fn goods_receipt_routes() -> Router<AppState> {
    Router::new()
        .route("/:receipt_id", put(update_receipt))
        .route("/:receipt_id", delete(delete_receipt))
}
