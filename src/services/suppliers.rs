use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::access::{Action, Principal};
use crate::entities::supplier;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::require_system_access;

lazy_static! {
    static ref PHONE_RE: Regex = Regex::new(r"^\+?1?\d{9,15}$").expect("valid phone regex");
}

#[derive(Debug, Clone)]
pub struct CreateSupplierInput {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateSupplierInput {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Service for tenant suppliers
#[derive(Clone)]
pub struct SupplierService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl SupplierService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    fn validate_phone(phone: &str) -> Result<(), ServiceError> {
        if PHONE_RE.is_match(phone) {
            Ok(())
        } else {
            Err(ServiceError::ValidationError(
                "Phone number must be entered in the format: '+999999999'. Up to 15 digits allowed."
                    .into(),
            ))
        }
    }

    /// Creates a supplier. `(system, name)` must be unique.
    #[instrument(skip(self))]
    pub async fn create_supplier(
        &self,
        principal: &Principal,
        system_id: i64,
        input: CreateSupplierInput,
    ) -> Result<supplier::Model, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ManageSuppliers).await?;

        let name = input.name.trim();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "supplier name cannot be empty".into(),
            ));
        }
        Self::validate_phone(&input.phone)?;

        let duplicate = supplier::Entity::find()
            .filter(supplier::Column::SystemId.eq(system_id))
            .filter(supplier::Column::Name.eq(name))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if duplicate.is_some() {
            return Err(ServiceError::Conflict(format!(
                "supplier '{}' already exists in this system",
                name
            )));
        }

        let now = Utc::now();
        let active = supplier::ActiveModel {
            system_id: Set(system_id),
            name: Set(name.to_string()),
            phone: Set(input.phone),
            email: Set(input.email),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let created = active.insert(db).await.map_err(ServiceError::db_error)?;

        info!("Supplier created: {} in system {}", created.id, system_id);
        let _ = self
            .event_sender
            .send(Event::SupplierCreated {
                system_id,
                supplier_id: created.id,
            })
            .await;
        Ok(created)
    }

    /// Fetches one supplier scoped to the tenant.
    #[instrument(skip(self))]
    pub async fn get_supplier(
        &self,
        principal: &Principal,
        system_id: i64,
        supplier_id: i64,
    ) -> Result<supplier::Model, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ViewCatalog).await?;
        self.find_in_system(supplier_id, system_id).await
    }

    /// Lists the suppliers of a system.
    #[instrument(skip(self))]
    pub async fn list_suppliers(
        &self,
        principal: &Principal,
        system_id: i64,
    ) -> Result<Vec<supplier::Model>, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ViewCatalog).await?;

        supplier::Entity::find()
            .filter(supplier::Column::SystemId.eq(system_id))
            .order_by_asc(supplier::Column::Name)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Updates supplier contact details.
    #[instrument(skip(self))]
    pub async fn update_supplier(
        &self,
        principal: &Principal,
        system_id: i64,
        supplier_id: i64,
        input: UpdateSupplierInput,
    ) -> Result<supplier::Model, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ManageSuppliers).await?;

        let existing = self.find_in_system(supplier_id, system_id).await?;
        let mut active: supplier::ActiveModel = existing.into();

        if let Some(name) = input.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(ServiceError::ValidationError(
                    "supplier name cannot be empty".into(),
                ));
            }
            let duplicate = supplier::Entity::find()
                .filter(supplier::Column::SystemId.eq(system_id))
                .filter(supplier::Column::Name.eq(name.clone()))
                .filter(supplier::Column::Id.ne(supplier_id))
                .one(db)
                .await
                .map_err(ServiceError::db_error)?;
            if duplicate.is_some() {
                return Err(ServiceError::Conflict(format!(
                    "supplier '{}' already exists in this system",
                    name
                )));
            }
            active.name = Set(name);
        }
        if let Some(phone) = input.phone {
            Self::validate_phone(&phone)?;
            active.phone = Set(phone);
        }
        if let Some(email) = input.email {
            active.email = Set(Some(email));
        }
        active.updated_at = Set(Utc::now());

        active.update(db).await.map_err(ServiceError::db_error)
    }

    /// Deletes a supplier. Fails while purchase orders still reference it.
    #[instrument(skip(self))]
    pub async fn delete_supplier(
        &self,
        principal: &Principal,
        system_id: i64,
        supplier_id: i64,
    ) -> Result<(), ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ManageSuppliers).await?;

        let existing = self.find_in_system(supplier_id, system_id).await?;

        let referenced = crate::entities::purchase_order::Entity::find()
            .filter(crate::entities::purchase_order::Column::SupplierId.eq(supplier_id))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if referenced.is_some() {
            return Err(ServiceError::Conflict(
                "supplier has purchase orders and cannot be deleted".into(),
            ));
        }

        existing.delete(db).await.map_err(ServiceError::db_error)?;
        Ok(())
    }

    async fn find_in_system(
        &self,
        supplier_id: i64,
        system_id: i64,
    ) -> Result<supplier::Model, ServiceError> {
        supplier::Entity::find_by_id(supplier_id)
            .filter(supplier::Column::SystemId.eq(system_id))
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Supplier {} not found", supplier_id)))
    }

    #[cfg(test)]
    pub(crate) fn phone_is_valid(phone: &str) -> bool {
        PHONE_RE.is_match(phone)
    }
}

#[cfg(test)]
mod tests {
    use super::SupplierService;

    #[test]
    fn accepts_international_phone_numbers() {
        assert!(SupplierService::phone_is_valid("+254712345678"));
        assert!(SupplierService::phone_is_valid("0712345678"));
    }

    #[test]
    fn rejects_malformed_phone_numbers() {
        assert!(!SupplierService::phone_is_valid("12345"));
        assert!(!SupplierService::phone_is_valid("phone"));
        assert!(!SupplierService::phone_is_valid("+1234567890123456789"));
    }
}
