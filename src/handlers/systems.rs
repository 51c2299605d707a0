use super::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{
    access::Principal,
    errors::ApiError,
    handlers::AppState,
    services::systems::{CreateSystemInput, UpdateSystemInput},
};
use axum::{
    extract::{Json, Path, State},
    routing::get,
    Router,
};
use sea_orm::ActiveEnum;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::system::SystemCategory;

// Request and response DTOs

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateSystemRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// "restaurant" or "supermarket"; immutable after creation
    #[schema(example = "supermarket")]
    pub category: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateSystemRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
    pub is_active: Option<bool>,
}

fn parse_category(raw: &str) -> Result<SystemCategory, ApiError> {
    SystemCategory::try_from_value(&raw.to_string())
        .map_err(|_| ApiError::ValidationError(format!("unknown system category '{}'", raw)))
}

// Handler functions

/// Create a new system (tenant)
#[utoipa::path(
    post,
    path = "/api/v1/systems",
    request_body = CreateSystemRequest,
    responses(
        (status = 201, description = "System created", body = serde_json::Value),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "systems"
)]
pub async fn create_system(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<CreateSystemRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;
    let category = parse_category(&payload.category)?;

    let system = state
        .services
        .systems
        .create_system(
            &principal,
            CreateSystemInput {
                name: payload.name,
                category,
                description: payload.description,
                is_public: payload.is_public,
            },
        )
        .await
        .map_err(map_service_error)?;

    info!("System created: {}", system.id);
    Ok(created_response(system))
}

/// List systems owned by the caller
#[utoipa::path(
    get,
    path = "/api/v1/systems",
    responses(
        (status = 200, description = "Owned systems", body = serde_json::Value)
    ),
    tag = "systems"
)]
pub async fn list_systems(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let systems = state
        .services
        .systems
        .list_owned(&principal)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(systems))
}

/// Get a system by id
#[utoipa::path(
    get,
    path = "/api/v1/systems/{system_id}",
    params(("system_id" = i64, Path, description = "System ID")),
    responses(
        (status = 200, description = "System fetched", body = serde_json::Value),
        (status = 404, description = "System not found", body = crate::errors::ErrorResponse)
    ),
    tag = "systems"
)]
pub async fn get_system(
    State(state): State<AppState>,
    principal: Principal,
    Path(system_id): Path<i64>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let system = state
        .services
        .systems
        .get_system(&principal, system_id)
        .await
        .map_err(map_service_error)?;
    Ok(success_response(system))
}

/// Update a system's profile (owner only; category is immutable)
#[utoipa::path(
    put,
    path = "/api/v1/systems/{system_id}",
    request_body = UpdateSystemRequest,
    params(("system_id" = i64, Path, description = "System ID")),
    responses(
        (status = 200, description = "System updated", body = serde_json::Value),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse)
    ),
    tag = "systems"
)]
pub async fn update_system(
    State(state): State<AppState>,
    principal: Principal,
    Path(system_id): Path<i64>,
    Json(payload): Json<UpdateSystemRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let system = state
        .services
        .systems
        .update_system(
            &principal,
            system_id,
            UpdateSystemInput {
                name: payload.name,
                description: payload.description,
                is_public: payload.is_public,
                is_active: payload.is_active,
            },
        )
        .await
        .map_err(map_service_error)?;
    Ok(success_response(system))
}

/// Delete a system (owner only)
#[utoipa::path(
    delete,
    path = "/api/v1/systems/{system_id}",
    params(("system_id" = i64, Path, description = "System ID")),
    responses(
        (status = 204, description = "System deleted"),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse)
    ),
    tag = "systems"
)]
pub async fn delete_system(
    State(state): State<AppState>,
    principal: Principal,
    Path(system_id): Path<i64>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .systems
        .delete_system(&principal, system_id)
        .await
        .map_err(map_service_error)?;

    info!("System deleted: {}", system_id);
    Ok(no_content_response())
}

/// Creates the router for system endpoints
pub fn system_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_systems).post(create_system))
        .route(
            "/:system_id",
            get(get_system).put(update_system).delete(delete_system),
        )
}
