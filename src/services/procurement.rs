use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionError, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::access::{Action, Principal};
use crate::entities::{
    product,
    purchase_order::{self, PurchaseOrderStatus},
    supplier,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::require_system_access;

/// Days until the default expected delivery when none is given.
const DEFAULT_DELIVERY_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct CreatePurchaseOrderInput {
    pub supplier_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub cost: Decimal,
    pub expected_delivery_date: Option<NaiveDate>,
}

/// Service for supplier purchase orders
#[derive(Clone)]
pub struct PurchaseOrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl PurchaseOrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Creates a purchase order in `pending` state. The product's cost is
    /// updated to the order cost in the same transaction.
    #[instrument(skip(self))]
    pub async fn create_purchase_order(
        &self,
        principal: &Principal,
        system_id: i64,
        input: CreatePurchaseOrderInput,
    ) -> Result<purchase_order::Model, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ManagePurchaseOrders).await?;

        if input.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "quantity must be greater than zero".into(),
            ));
        }
        if input.cost < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "cost cannot be negative".into(),
            ));
        }

        let created = db
            .transaction::<_, purchase_order::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let supplier = supplier::Entity::find_by_id(input.supplier_id)
                        .filter(supplier::Column::SystemId.eq(system_id))
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Supplier {} not found",
                                input.supplier_id
                            ))
                        })?;

                    let product = product::Entity::find_by_id(input.product_id)
                        .filter(product::Column::SystemId.eq(system_id))
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Product {} not found",
                                input.product_id
                            ))
                        })?;

                    let now = Utc::now();
                    let expected = input
                        .expected_delivery_date
                        .unwrap_or_else(|| now.date_naive() + Duration::days(DEFAULT_DELIVERY_DAYS));

                    let order = purchase_order::ActiveModel {
                        system_id: Set(system_id),
                        supplier_id: Set(supplier.id),
                        product_id: Set(product.id),
                        quantity: Set(input.quantity),
                        cost: Set(input.cost),
                        order_date: Set(now),
                        expected_delivery_date: Set(expected),
                        status: Set(PurchaseOrderStatus::Pending),
                        created_at: Set(now),
                        updated_at: Set(now),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    // Latest purchase cost becomes the product's cost.
                    if product.cost != input.cost {
                        let mut active: product::ActiveModel = product.into();
                        active.cost = Set(input.cost);
                        active.updated_at = Set(now);
                        active.update(txn).await.map_err(ServiceError::db_error)?;
                    }

                    Ok(order)
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        info!(
            "Purchase order created: {} in system {}",
            created.id, system_id
        );
        let _ = self
            .event_sender
            .send(Event::PurchaseOrderCreated {
                system_id,
                purchase_order_id: created.id,
            })
            .await;

        Ok(created)
    }

    /// Fetches one purchase order scoped to the tenant.
    #[instrument(skip(self))]
    pub async fn get_purchase_order(
        &self,
        principal: &Principal,
        system_id: i64,
        purchase_order_id: i64,
    ) -> Result<purchase_order::Model, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ManagePurchaseOrders).await?;
        self.find_in_system(purchase_order_id, system_id).await
    }

    /// Lists purchase orders, optionally filtered by status.
    #[instrument(skip(self))]
    pub async fn list_purchase_orders(
        &self,
        principal: &Principal,
        system_id: i64,
        status: Option<PurchaseOrderStatus>,
    ) -> Result<Vec<purchase_order::Model>, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ManagePurchaseOrders).await?;

        let mut query = purchase_order::Entity::find()
            .filter(purchase_order::Column::SystemId.eq(system_id))
            .order_by_desc(purchase_order::Column::Id);
        if let Some(status) = status {
            query = query.filter(purchase_order::Column::Status.eq(status));
        }
        query.all(db).await.map_err(ServiceError::db_error)
    }

    /// Cancels a purchase order. Terminal: receiving logic never leaves
    /// this state.
    #[instrument(skip(self))]
    pub async fn cancel_purchase_order(
        &self,
        principal: &Principal,
        system_id: i64,
        purchase_order_id: i64,
    ) -> Result<purchase_order::Model, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ManagePurchaseOrders).await?;

        let existing = self.find_in_system(purchase_order_id, system_id).await?;
        if existing.status == PurchaseOrderStatus::Cancelled {
            return Err(ServiceError::InvalidOperation(
                "purchase order is already cancelled".into(),
            ));
        }

        let old_status = existing.status;
        let mut active: purchase_order::ActiveModel = existing.into();
        active.status = Set(PurchaseOrderStatus::Cancelled);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await.map_err(ServiceError::db_error)?;

        info!("Purchase order cancelled: {}", purchase_order_id);
        let _ = self
            .event_sender
            .send(Event::PurchaseOrderStatusChanged {
                purchase_order_id,
                old_status: old_status.to_string(),
                new_status: updated.status.to_string(),
            })
            .await;
        let _ = self
            .event_sender
            .send(Event::PurchaseOrderCancelled(purchase_order_id))
            .await;

        Ok(updated)
    }

    async fn find_in_system(
        &self,
        purchase_order_id: i64,
        system_id: i64,
    ) -> Result<purchase_order::Model, ServiceError> {
        purchase_order::Entity::find_by_id(purchase_order_id)
            .filter(purchase_order::Column::SystemId.eq(system_id))
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Purchase order {} not found",
                    purchase_order_id
                ))
            })
    }
}
