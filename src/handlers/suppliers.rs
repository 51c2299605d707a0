use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{
    access::Principal,
    errors::ApiError,
    handlers::AppState,
    services::suppliers::{CreateSupplierInput, UpdateSupplierInput},
};
use axum::{
    extract::{Json, Path, State},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

// Request and response DTOs

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSupplierRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[schema(example = "+254712345678")]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateSupplierRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

// Handler functions

/// Create a supplier
#[utoipa::path(
    post,
    path = "/api/v1/systems/{system_id}/suppliers",
    request_body = CreateSupplierRequest,
    params(("system_id" = i64, Path, description = "System ID")),
    responses(
        (status = 201, description = "Supplier created", body = serde_json::Value),
        (status = 409, description = "Supplier name taken", body = crate::errors::ErrorResponse)
    ),
    tag = "suppliers"
)]
pub async fn create_supplier(
    State(state): State<AppState>,
    principal: Principal,
    Path(system_id): Path<i64>,
    Json(payload): Json<CreateSupplierRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let supplier = state
        .services
        .suppliers
        .create_supplier(
            &principal,
            system_id,
            CreateSupplierInput {
                name: payload.name,
                phone: payload.phone,
                email: payload.email,
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(created_response(supplier))
}

/// List the suppliers of a system
#[utoipa::path(
    get,
    path = "/api/v1/systems/{system_id}/suppliers",
    params(("system_id" = i64, Path, description = "System ID")),
    responses(
        (status = 200, description = "Suppliers", body = serde_json::Value)
    ),
    tag = "suppliers"
)]
pub async fn list_suppliers(
    State(state): State<AppState>,
    principal: Principal,
    Path(system_id): Path<i64>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let suppliers = state
        .services
        .suppliers
        .list_suppliers(&principal, system_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(suppliers))
}

/// Get one supplier
#[utoipa::path(
    get,
    path = "/api/v1/systems/{system_id}/suppliers/{supplier_id}",
    params(
        ("system_id" = i64, Path, description = "System ID"),
        ("supplier_id" = i64, Path, description = "Supplier ID")
    ),
    responses(
        (status = 200, description = "Supplier fetched", body = serde_json::Value),
        (status = 404, description = "Supplier not found", body = crate::errors::ErrorResponse)
    ),
    tag = "suppliers"
)]
pub async fn get_supplier(
    State(state): State<AppState>,
    principal: Principal,
    Path((system_id, supplier_id)): Path<(i64, i64)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let supplier = state
        .services
        .suppliers
        .get_supplier(&principal, system_id, supplier_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(supplier))
}

/// Update a supplier
#[utoipa::path(
    put,
    path = "/api/v1/systems/{system_id}/suppliers/{supplier_id}",
    request_body = UpdateSupplierRequest,
    params(
        ("system_id" = i64, Path, description = "System ID"),
        ("supplier_id" = i64, Path, description = "Supplier ID")
    ),
    responses(
        (status = 200, description = "Supplier updated", body = serde_json::Value),
        (status = 404, description = "Supplier not found", body = crate::errors::ErrorResponse)
    ),
    tag = "suppliers"
)]
pub async fn update_supplier(
    State(state): State<AppState>,
    principal: Principal,
    Path((system_id, supplier_id)): Path<(i64, i64)>,
    Json(payload): Json<UpdateSupplierRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let supplier = state
        .services
        .suppliers
        .update_supplier(
            &principal,
            system_id,
            supplier_id,
            UpdateSupplierInput {
                name: payload.name,
                phone: payload.phone,
                email: payload.email,
            },
        )
        .await
        .map_err(map_service_error)?;
    Ok(success_response(supplier))
}

/// Delete a supplier
#[utoipa::path(
    delete,
    path = "/api/v1/systems/{system_id}/suppliers/{supplier_id}",
    params(
        ("system_id" = i64, Path, description = "System ID"),
        ("supplier_id" = i64, Path, description = "Supplier ID")
    ),
    responses(
        (status = 204, description = "Supplier deleted"),
        (status = 409, description = "Supplier has purchase orders", body = crate::errors::ErrorResponse)
    ),
    tag = "suppliers"
)]
pub async fn delete_supplier(
    State(state): State<AppState>,
    principal: Principal,
    Path((system_id, supplier_id)): Path<(i64, i64)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .suppliers
        .delete_supplier(&principal, system_id, supplier_id)
        .await
        .map_err(map_service_error)?;
    Ok(no_content_response())
}

/// Creates the router for supplier endpoints (nested under a system)
pub fn supplier_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_suppliers).post(create_supplier))
        .route(
            "/:supplier_id",
            get(get_supplier)
                .put(update_supplier)
                .delete(delete_supplier),
        )
}
