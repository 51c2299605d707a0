pub mod employees;
pub mod inventory;
pub mod procurement;
pub mod products;
pub mod receiving;
pub mod sales;
pub mod suppliers;
pub mod systems;

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};

use crate::access::{self, Action, Principal};
use crate::entities::{employee, system};
use crate::errors::ServiceError;

/// Loads the target system and the caller's employment row, then gates the
/// action through the access evaluator. Returns the system on success so
/// callers can reuse it without a second lookup.
pub(crate) async fn require_system_access<C: ConnectionTrait>(
    conn: &C,
    principal: &Principal,
    system_id: i64,
    action: Action,
) -> Result<system::Model, ServiceError> {
    let system = system::Entity::find_by_id(system_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("System {} not found", system_id)))?;

    let employment = employee::Entity::find()
        .filter(employee::Column::UserId.eq(principal.user_id))
        .filter(employee::Column::SystemId.eq(system_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;

    access::authorize(principal, &system, employment.as_ref(), action)?;
    Ok(system)
}

/// Loads the system and verifies the principal owns it. Owner-only
/// operations (deleting a tenant, editing its profile) go through here
/// instead of the role table.
pub(crate) async fn require_system_owner<C: ConnectionTrait>(
    conn: &C,
    principal: &Principal,
    system_id: i64,
) -> Result<system::Model, ServiceError> {
    let system = system::Entity::find_by_id(system_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("System {} not found", system_id)))?;

    if system.owner_id != principal.user_id {
        return Err(ServiceError::Forbidden(format!(
            "only the owner may manage system {}",
            system_id
        )));
    }
    Ok(system)
}
