use super::common::{created_response, map_service_error, success_response, validate_input};
use crate::{
    access::Principal,
    entities::employee::EmployeeRole,
    errors::ApiError,
    handlers::AppState,
    services::employees::{AddEmployeeInput, UpdateEmployeeInput},
};
use axum::{
    extract::{Json, Path, State},
    routing::{get, post, put},
    Router,
};
use sea_orm::ActiveEnum;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// Request and response DTOs

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddEmployeeRequest {
    /// Login account of the invited employee
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Role drawn from the system category's role family
    #[schema(example = "cashier_supermarket")]
    pub role: String,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateEmployeeRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

fn parse_role(raw: &str) -> Result<EmployeeRole, ApiError> {
    EmployeeRole::try_from_value(&raw.to_string())
        .map_err(|_| ApiError::ValidationError(format!("unknown employee role '{}'", raw)))
}

// Handler functions

/// Add an employee to a system
#[utoipa::path(
    post,
    path = "/api/v1/systems/{system_id}/employees",
    request_body = AddEmployeeRequest,
    params(("system_id" = i64, Path, description = "System ID")),
    responses(
        (status = 201, description = "Employee added", body = serde_json::Value),
        (status = 409, description = "Account already employed here", body = crate::errors::ErrorResponse)
    ),
    tag = "employees"
)]
pub async fn add_employee(
    State(state): State<AppState>,
    principal: Principal,
    Path(system_id): Path<i64>,
    Json(payload): Json<AddEmployeeRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    let role = parse_role(&payload.role)?;

    let employee = state
        .services
        .employees
        .add_employee(
            &principal,
            system_id,
            AddEmployeeInput {
                user_id: payload.user_id,
                name: payload.name,
                role,
                phone: payload.phone,
            },
        )
        .await
        .map_err(map_service_error)?;

    Ok(created_response(employee))
}

/// List the employees of a system
#[utoipa::path(
    get,
    path = "/api/v1/systems/{system_id}/employees",
    params(("system_id" = i64, Path, description = "System ID")),
    responses(
        (status = 200, description = "Employees", body = serde_json::Value)
    ),
    tag = "employees"
)]
pub async fn list_employees(
    State(state): State<AppState>,
    principal: Principal,
    Path(system_id): Path<i64>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let employees = state
        .services
        .employees
        .list_employees(&principal, system_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(employees))
}

/// Update an employee
#[utoipa::path(
    put,
    path = "/api/v1/systems/{system_id}/employees/{employee_id}",
    request_body = UpdateEmployeeRequest,
    params(
        ("system_id" = i64, Path, description = "System ID"),
        ("employee_id" = i64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee updated", body = serde_json::Value),
        (status = 404, description = "Employee not found", body = crate::errors::ErrorResponse)
    ),
    tag = "employees"
)]
pub async fn update_employee(
    State(state): State<AppState>,
    principal: Principal,
    Path((system_id, employee_id)): Path<(i64, i64)>,
    Json(payload): Json<UpdateEmployeeRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    let role = payload.role.as_deref().map(parse_role).transpose()?;

    let employee = state
        .services
        .employees
        .update_employee(
            &principal,
            system_id,
            employee_id,
            UpdateEmployeeInput {
                name: payload.name,
                role,
                phone: payload.phone,
                is_active: payload.is_active,
            },
        )
        .await
        .map_err(map_service_error)?;
    Ok(success_response(employee))
}

/// Deactivate an employee
#[utoipa::path(
    post,
    path = "/api/v1/systems/{system_id}/employees/{employee_id}/deactivate",
    params(
        ("system_id" = i64, Path, description = "System ID"),
        ("employee_id" = i64, Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee deactivated", body = serde_json::Value),
        (status = 404, description = "Employee not found", body = crate::errors::ErrorResponse)
    ),
    tag = "employees"
)]
pub async fn deactivate_employee(
    State(state): State<AppState>,
    principal: Principal,
    Path((system_id, employee_id)): Path<(i64, i64)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let employee = state
        .services
        .employees
        .deactivate_employee(&principal, system_id, employee_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(employee))
}

/// Creates the router for employee endpoints (nested under a system)
pub fn employee_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_employees).post(add_employee))
        .route("/:employee_id", put(update_employee))
        .route("/:employee_id/deactivate", post(deactivate_employee))
}
