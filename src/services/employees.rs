use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::access::{self, Action, Principal};
use crate::entities::employee::{self, EmployeeRole};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::require_system_access;

#[derive(Debug, Clone)]
pub struct AddEmployeeInput {
    pub user_id: Uuid,
    pub name: String,
    pub role: EmployeeRole,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateEmployeeInput {
    pub name: Option<String>,
    pub role: Option<EmployeeRole>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

/// Service for managing the employees of a system
#[derive(Clone)]
pub struct EmployeeService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl EmployeeService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Adds an employee to a system. The `(user, system)` pair must be
    /// unique and the role must belong to the system category's family.
    #[instrument(skip(self))]
    pub async fn add_employee(
        &self,
        principal: &Principal,
        system_id: i64,
        input: AddEmployeeInput,
    ) -> Result<employee::Model, ServiceError> {
        let db = self.db.as_ref();
        let system =
            require_system_access(db, principal, system_id, Action::ManageEmployees).await?;

        if input.name.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "employee name cannot be empty".into(),
            ));
        }
        if !access::category_roles(system.category).contains(&input.role) {
            return Err(ServiceError::ValidationError(format!(
                "role {:?} is not valid for a {:?} system",
                input.role, system.category
            )));
        }

        let existing = employee::Entity::find()
            .filter(employee::Column::UserId.eq(input.user_id))
            .filter(employee::Column::SystemId.eq(system_id))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "this account already has an employee profile in the system".into(),
            ));
        }

        let now = Utc::now();
        let active = employee::ActiveModel {
            user_id: Set(input.user_id),
            system_id: Set(system_id),
            name: Set(input.name.trim().to_string()),
            role: Set(input.role),
            phone: Set(input.phone),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let created = active.insert(db).await.map_err(ServiceError::db_error)?;

        info!(
            "Employee {} added to system {} as {:?}",
            created.id, system_id, created.role
        );
        let _ = self
            .event_sender
            .send(Event::EmployeeAdded {
                system_id,
                employee_id: created.id,
            })
            .await;

        Ok(created)
    }

    /// Lists the employees of a system. Visible to any active member.
    #[instrument(skip(self))]
    pub async fn list_employees(
        &self,
        principal: &Principal,
        system_id: i64,
    ) -> Result<Vec<employee::Model>, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ViewCatalog).await?;

        employee::Entity::find()
            .filter(employee::Column::SystemId.eq(system_id))
            .order_by_asc(employee::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Updates an employee's profile or role.
    #[instrument(skip(self))]
    pub async fn update_employee(
        &self,
        principal: &Principal,
        system_id: i64,
        employee_id: i64,
        input: UpdateEmployeeInput,
    ) -> Result<employee::Model, ServiceError> {
        let db = self.db.as_ref();
        let system =
            require_system_access(db, principal, system_id, Action::ManageEmployees).await?;

        let existing = employee::Entity::find_by_id(employee_id)
            .filter(employee::Column::SystemId.eq(system_id))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Employee {} not found", employee_id))
            })?;

        if let Some(role) = input.role {
            if !access::category_roles(system.category).contains(&role) {
                return Err(ServiceError::ValidationError(format!(
                    "role {:?} is not valid for a {:?} system",
                    role, system.category
                )));
            }
        }

        let mut active: employee::ActiveModel = existing.into();
        if let Some(name) = input.name {
            if name.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "employee name cannot be empty".into(),
                ));
            }
            active.name = Set(name.trim().to_string());
        }
        if let Some(role) = input.role {
            active.role = Set(role);
        }
        if let Some(phone) = input.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await.map_err(ServiceError::db_error)?;

        let _ = self
            .event_sender
            .send(Event::EmployeeUpdated {
                system_id,
                employee_id: updated.id,
            })
            .await;
        Ok(updated)
    }

    /// Deactivates an employee without deleting the row, so sales history
    /// keeps its cashier references.
    #[instrument(skip(self))]
    pub async fn deactivate_employee(
        &self,
        principal: &Principal,
        system_id: i64,
        employee_id: i64,
    ) -> Result<employee::Model, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ManageEmployees).await?;

        let existing = employee::Entity::find_by_id(employee_id)
            .filter(employee::Column::SystemId.eq(system_id))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Employee {} not found", employee_id))
            })?;

        let mut active: employee::ActiveModel = existing.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await.map_err(ServiceError::db_error)?;

        info!("Employee {} deactivated in system {}", employee_id, system_id);
        let _ = self
            .event_sender
            .send(Event::EmployeeDeactivated {
                system_id,
                employee_id,
            })
            .await;
        Ok(updated)
    }
}
