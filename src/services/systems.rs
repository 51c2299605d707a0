use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::access::{Action, Principal};
use crate::entities::system::{self, SystemCategory};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::{require_system_access, require_system_owner};

/// Input for creating a tenant.
#[derive(Debug, Clone)]
pub struct CreateSystemInput {
    pub name: String,
    pub category: SystemCategory,
    pub description: Option<String>,
    pub is_public: bool,
}

/// Input for updating tenant profile fields. The category is immutable and
/// deliberately absent here.
#[derive(Debug, Clone, Default)]
pub struct UpdateSystemInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
    pub is_active: Option<bool>,
}

/// Service for managing tenants (systems)
#[derive(Clone)]
pub struct SystemService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl SystemService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Creates a new system owned by the principal. Category is fixed for
    /// the lifetime of the tenant.
    #[instrument(skip(self))]
    pub async fn create_system(
        &self,
        principal: &Principal,
        input: CreateSystemInput,
    ) -> Result<system::Model, ServiceError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "system name cannot be empty".into(),
            ));
        }

        let now = Utc::now();
        let active = system::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            owner_id: Set(principal.user_id),
            category: Set(input.category),
            description: Set(input.description.unwrap_or_default()),
            is_active: Set(true),
            is_public: Set(input.is_public),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let created = active
            .insert(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        info!("System created: {} ({:?})", created.id, created.category);
        let _ = self
            .event_sender
            .send(Event::SystemCreated(created.id))
            .await;

        Ok(created)
    }

    /// Fetches a system the principal can see (owner or any active employee).
    #[instrument(skip(self))]
    pub async fn get_system(
        &self,
        principal: &Principal,
        system_id: i64,
    ) -> Result<system::Model, ServiceError> {
        require_system_access(self.db.as_ref(), principal, system_id, Action::ViewCatalog).await
    }

    /// Lists systems owned by the principal.
    #[instrument(skip(self))]
    pub async fn list_owned(&self, principal: &Principal) -> Result<Vec<system::Model>, ServiceError> {
        system::Entity::find()
            .filter(system::Column::OwnerId.eq(principal.user_id))
            .order_by_asc(system::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Updates tenant profile fields. Owner only; the category can never
    /// change after creation.
    #[instrument(skip(self))]
    pub async fn update_system(
        &self,
        principal: &Principal,
        system_id: i64,
        input: UpdateSystemInput,
    ) -> Result<system::Model, ServiceError> {
        let existing = require_system_owner(self.db.as_ref(), principal, system_id).await?;

        let mut active: system::ActiveModel = existing.into();
        if let Some(name) = input.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ServiceError::ValidationError(
                    "system name cannot be empty".into(),
                ));
            }
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(is_public) = input.is_public {
            active.is_public = Set(is_public);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        let updated = active
            .update(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let _ = self
            .event_sender
            .send(Event::SystemUpdated(updated.id))
            .await;
        Ok(updated)
    }

    /// Deletes a tenant and everything under it. Owner only.
    #[instrument(skip(self))]
    pub async fn delete_system(
        &self,
        principal: &Principal,
        system_id: i64,
    ) -> Result<(), ServiceError> {
        let existing = require_system_owner(self.db.as_ref(), principal, system_id).await?;

        existing
            .delete(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        info!("System deleted: {}", system_id);
        let _ = self
            .event_sender
            .send(Event::SystemDeleted(system_id))
            .await;
        Ok(())
    }
}
