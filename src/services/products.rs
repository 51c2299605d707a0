use chrono::{Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::access::{Action, Principal};
use crate::entities::{goods_receipt, product, purchase_order};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::require_system_access;

/// How many generated codes to try before giving up on a unique barcode.
const BARCODE_ATTEMPTS: u32 = 10;

/// Curated categories pass as-is; custom ones just need to be non-empty.
fn validate_category(category: &str) -> Result<(), ServiceError> {
    if product::DEFAULT_CATEGORIES.contains(&category) {
        return Ok(());
    }
    if category.trim().is_empty() {
        return Err(ServiceError::ValidationError(
            "category cannot be empty".into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CreateProductInput {
    pub name: String,
    pub price: Decimal,
    pub cost: Option<Decimal>,
    pub minimum_stock: Option<i32>,
    pub category: Option<String>,
    pub discount_percentage: Option<Decimal>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub minimum_stock: Option<i32>,
    pub category: Option<String>,
    pub discount_percentage: Option<Decimal>,
}

/// Stock grouped by batch expiry relative to today.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpiryBuckets {
    pub expired: i64,
    pub expiring_soon: i64,
    pub expiring_later: i64,
}

/// Stock grouped by receipt age relative to today.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgeBuckets {
    pub new: i64,
    pub recent: i64,
    pub old: i64,
}

/// Service for the tenant product catalog and derived inventory views
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Creates a product and assigns it a generated, globally unique
    /// 13-digit barcode. Barcodes are never user-supplied.
    #[instrument(skip(self))]
    pub async fn create_product(
        &self,
        principal: &Principal,
        system_id: i64,
        input: CreateProductInput,
    ) -> Result<product::Model, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ManageProducts).await?;

        let name = input.name.trim();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "product name cannot be empty".into(),
            ));
        }
        if input.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price cannot be negative".into(),
            ));
        }
        let category = input
            .category
            .unwrap_or_else(|| "pantry".to_string());
        validate_category(&category)?;

        let now = Utc::now();
        let active = product::ActiveModel {
            system_id: Set(system_id),
            name: Set(name.to_string()),
            barcode: Set(None),
            price: Set(input.price),
            cost: Set(input.cost.unwrap_or(Decimal::ZERO)),
            stock_quantity: Set(0),
            minimum_stock: Set(input.minimum_stock.unwrap_or(10)),
            expiry_date: Set(None),
            category: Set(category.trim().to_string()),
            discount_percentage: Set(input.discount_percentage.unwrap_or(Decimal::ZERO)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let created = active.insert(db).await.map_err(ServiceError::db_error)?;

        // The barcode embeds the row id, so it is assigned after the insert.
        let barcode = self.generate_barcode(system_id, created.id).await?;
        let mut active: product::ActiveModel = created.into();
        active.barcode = Set(Some(barcode));
        let created = active.update(db).await.map_err(ServiceError::db_error)?;

        info!("Product created: {} in system {}", created.id, system_id);
        let _ = self
            .event_sender
            .send(Event::ProductCreated {
                system_id,
                product_id: created.id,
            })
            .await;

        Ok(created)
    }

    /// Generates a unique 13-digit barcode: 3 digits of system id, 5 of
    /// product id, 5 random.
    async fn generate_barcode(
        &self,
        system_id: i64,
        product_id: i64,
    ) -> Result<String, ServiceError> {
        let db = self.db.as_ref();
        for _ in 0..BARCODE_ATTEMPTS {
            let unique: u32 = rand::thread_rng().gen_range(0..100_000);
            let candidate = format!(
                "{:03}{:05}{:05}",
                system_id % 1_000,
                product_id % 100_000,
                unique
            );
            let candidate: String = candidate.chars().take(13).collect();

            let taken = product::Entity::find()
                .filter(product::Column::Barcode.eq(candidate.clone()))
                .one(db)
                .await
                .map_err(ServiceError::db_error)?;
            if taken.is_none() {
                return Ok(candidate);
            }
            warn!("Barcode collision for product {}, retrying", product_id);
        }
        Err(ServiceError::InternalError(format!(
            "could not generate a unique barcode for product {}",
            product_id
        )))
    }

    /// Fetches one product scoped to the tenant.
    #[instrument(skip(self))]
    pub async fn get_product(
        &self,
        principal: &Principal,
        system_id: i64,
        product_id: i64,
    ) -> Result<product::Model, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ViewCatalog).await?;
        self.find_in_system(product_id, system_id).await
    }

    /// Lists the products of a system, optionally filtered by a name search.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        principal: &Principal,
        system_id: i64,
        search: Option<String>,
    ) -> Result<Vec<product::Model>, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ViewCatalog).await?;

        let mut query = product::Entity::find()
            .filter(product::Column::SystemId.eq(system_id))
            .order_by_asc(product::Column::Id);
        if let Some(term) = search.filter(|t| !t.trim().is_empty()) {
            query = query.filter(product::Column::Name.contains(term.trim()));
        }
        query.all(db).await.map_err(ServiceError::db_error)
    }

    /// Updates product fields. Derived fields (`stock_quantity`,
    /// `expiry_date`) and the barcode are not editable.
    #[instrument(skip(self))]
    pub async fn update_product(
        &self,
        principal: &Principal,
        system_id: i64,
        product_id: i64,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ManageProducts).await?;

        let existing = self.find_in_system(product_id, system_id).await?;
        let mut active: product::ActiveModel = existing.into();

        if let Some(name) = input.name {
            if name.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "product name cannot be empty".into(),
                ));
            }
            active.name = Set(name.trim().to_string());
        }
        if let Some(price) = input.price {
            if price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "price cannot be negative".into(),
                ));
            }
            active.price = Set(price);
        }
        if let Some(cost) = input.cost {
            active.cost = Set(cost);
        }
        if let Some(minimum_stock) = input.minimum_stock {
            active.minimum_stock = Set(minimum_stock);
        }
        if let Some(category) = input.category {
            validate_category(&category)?;
            active.category = Set(category.trim().to_string());
        }
        if let Some(discount) = input.discount_percentage {
            active.discount_percentage = Set(discount);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await.map_err(ServiceError::db_error)?;
        let _ = self
            .event_sender
            .send(Event::ProductUpdated {
                system_id,
                product_id: updated.id,
            })
            .await;
        Ok(updated)
    }

    /// Deletes a product and its batches.
    #[instrument(skip(self))]
    pub async fn delete_product(
        &self,
        principal: &Principal,
        system_id: i64,
        product_id: i64,
    ) -> Result<(), ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ManageProducts).await?;

        let existing = self.find_in_system(product_id, system_id).await?;
        existing.delete(db).await.map_err(ServiceError::db_error)?;

        let _ = self
            .event_sender
            .send(Event::ProductDeleted {
                system_id,
                product_id,
            })
            .await;
        Ok(())
    }

    /// Products whose derived stock is below their minimum.
    #[instrument(skip(self))]
    pub async fn low_stock(
        &self,
        principal: &Principal,
        system_id: i64,
    ) -> Result<Vec<product::Model>, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ViewInventoryReports).await?;

        product::Entity::find()
            .filter(product::Column::SystemId.eq(system_id))
            .filter(
                Expr::col(product::Column::StockQuantity)
                    .lt(Expr::col(product::Column::MinimumStock)),
            )
            .order_by_asc(product::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Products with stock whose derived expiry falls within `days` from
    /// today.
    #[instrument(skip(self))]
    pub async fn expiring_soon(
        &self,
        principal: &Principal,
        system_id: i64,
        days: i64,
    ) -> Result<Vec<product::Model>, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ViewInventoryReports).await?;

        let today = Utc::now().date_naive();
        let horizon = today + Duration::days(days);
        product::Entity::find()
            .filter(product::Column::SystemId.eq(system_id))
            .filter(product::Column::ExpiryDate.is_not_null())
            .filter(product::Column::ExpiryDate.gte(today))
            .filter(product::Column::ExpiryDate.lte(horizon))
            .filter(product::Column::StockQuantity.gt(0))
            .order_by_asc(product::Column::ExpiryDate)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Products with stock whose derived expiry has already passed.
    #[instrument(skip(self))]
    pub async fn expired(
        &self,
        principal: &Principal,
        system_id: i64,
    ) -> Result<Vec<product::Model>, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ViewInventoryReports).await?;

        let today = Utc::now().date_naive();
        product::Entity::find()
            .filter(product::Column::SystemId.eq(system_id))
            .filter(product::Column::ExpiryDate.is_not_null())
            .filter(product::Column::ExpiryDate.lt(today))
            .filter(product::Column::StockQuantity.gt(0))
            .order_by_asc(product::Column::ExpiryDate)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Groups a product's stock into expired / expiring within 7 days /
    /// expiring later, from its batches with stock.
    #[instrument(skip(self))]
    pub async fn stock_by_expiry(
        &self,
        principal: &Principal,
        system_id: i64,
        product_id: i64,
    ) -> Result<ExpiryBuckets, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ViewInventoryReports).await?;
        let product = self.find_in_system(product_id, system_id).await?;

        let batches = product
            .find_related(crate::entities::product_batch::Entity)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let today = Utc::now().date_naive();
        let mut buckets = ExpiryBuckets::default();
        for batch in batches.iter().filter(|b| b.quantity > 0) {
            let Some(expiry) = batch.expiry_date else {
                buckets.expiring_later += batch.quantity as i64;
                continue;
            };
            let days_to_expiry = (expiry - today).num_days();
            if days_to_expiry < 0 {
                buckets.expired += batch.quantity as i64;
            } else if days_to_expiry <= 7 {
                buckets.expiring_soon += batch.quantity as i64;
            } else {
                buckets.expiring_later += batch.quantity as i64;
            }
        }
        Ok(buckets)
    }

    /// Groups a product's received quantities by receipt age: last 7 days,
    /// last 30 days, older.
    #[instrument(skip(self))]
    pub async fn stock_by_age(
        &self,
        principal: &Principal,
        system_id: i64,
        product_id: i64,
    ) -> Result<AgeBuckets, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ViewInventoryReports).await?;
        self.find_in_system(product_id, system_id).await?;

        let order_ids: Vec<i64> = purchase_order::Entity::find()
            .filter(purchase_order::Column::ProductId.eq(product_id))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|po| po.id)
            .collect();

        let mut buckets = AgeBuckets::default();
        if order_ids.is_empty() {
            return Ok(buckets);
        }

        let receipts = goods_receipt::Entity::find()
            .filter(goods_receipt::Column::PurchaseOrderId.is_in(order_ids))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let today = Utc::now().date_naive();
        for receipt in receipts {
            let days_old = (today - receipt.received_date).num_days();
            if days_old <= 7 {
                buckets.new += receipt.received_quantity as i64;
            } else if days_old <= 30 {
                buckets.recent += receipt.received_quantity as i64;
            } else {
                buckets.old += receipt.received_quantity as i64;
            }
        }
        Ok(buckets)
    }

    async fn find_in_system(
        &self,
        product_id: i64,
        system_id: i64,
    ) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(product_id)
            .filter(product::Column::SystemId.eq(system_id))
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }
}
