use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionError, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::access::{Action, Principal};
use crate::entities::{
    employee, product, product_batch,
    sale::{self, PaymentType},
    sale_allocation, sale_item,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::{inventory, require_system_access};

#[derive(Debug, Clone)]
pub struct SaleItemInput {
    pub product_id: i64,
    pub quantity: i32,
    /// Defaults to the product's current price.
    pub unit_price: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct CreateSaleInput {
    pub cashier_employee_id: Option<i64>,
    pub payment_type: PaymentType,
    pub discount_amount: Option<Decimal>,
    /// Defaults to the configured VAT rate.
    pub vat_rate: Option<Decimal>,
    pub items: Vec<SaleItemInput>,
}

/// A sale together with its line items.
#[derive(Debug, Clone, Serialize)]
pub struct SaleWithItems {
    pub sale: sale::Model,
    pub items: Vec<sale_item::Model>,
}

/// Service for point-of-sale transactions.
///
/// Stock deduction walks product batches first-expired-first-out inside the
/// sale transaction, recording an allocation per consumed batch so the exact
/// batches can be restored when an item is voided. The product row is locked
/// for the duration of the check-and-decrement so concurrent sales cannot
/// both pass the stock check.
#[derive(Clone)]
pub struct SaleService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    default_vat_rate: Decimal,
}

impl SaleService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: EventSender,
        default_vat_rate: Decimal,
    ) -> Self {
        Self {
            db,
            event_sender,
            default_vat_rate,
        }
    }

    /// Records a sale with its items, deducting stock and snapshotting unit
    /// price and cost at sale time. Fails before any write when stock is
    /// insufficient.
    #[instrument(skip(self, input))]
    pub async fn create_sale(
        &self,
        principal: &Principal,
        system_id: i64,
        input: CreateSaleInput,
    ) -> Result<SaleWithItems, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::RecordSales).await?;

        if input.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "a sale requires at least one item".into(),
            ));
        }
        for item in &input.items {
            if item.quantity <= 0 {
                return Err(ServiceError::ValidationError(
                    "item quantity must be greater than zero".into(),
                ));
            }
        }
        let sale_discount = input.discount_amount.unwrap_or(Decimal::ZERO);
        if sale_discount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "discount_amount cannot be negative".into(),
            ));
        }

        let vat_rate = input.vat_rate.unwrap_or(self.default_vat_rate);
        let receipt_number = generate_receipt_number(system_id);

        let result = db
            .transaction::<_, SaleWithItems, ServiceError>(move |txn| {
                Box::pin(async move {
                    if let Some(cashier_id) = input.cashier_employee_id {
                        employee::Entity::find_by_id(cashier_id)
                            .filter(employee::Column::SystemId.eq(system_id))
                            .one(txn)
                            .await
                            .map_err(ServiceError::db_error)?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "Employee {} not found",
                                    cashier_id
                                ))
                            })?;
                    }

                    let now = Utc::now();
                    let sale_row = sale::ActiveModel {
                        system_id: Set(system_id),
                        cashier_employee_id: Set(input.cashier_employee_id),
                        receipt_number: Set(receipt_number),
                        payment_type: Set(input.payment_type),
                        discount_amount: Set(sale_discount),
                        vat_rate: Set(vat_rate),
                        vat_amount: Set(Decimal::ZERO),
                        total_price: Set(Decimal::ZERO),
                        created_at: Set(now),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    let mut items = Vec::with_capacity(input.items.len());
                    for item in input.items {
                        let created =
                            sell_one_item(txn, system_id, sale_row.id, item).await?;
                        items.push(created);
                    }

                    let sale_row = retotal_sale(txn, sale_row, &items).await?;

                    Ok(SaleWithItems {
                        sale: sale_row,
                        items,
                    })
                })
            })
            .await
            .map_err(unwrap_txn_error)?;

        info!(
            "Sale {} completed in system {} ({} items)",
            result.sale.id,
            system_id,
            result.items.len()
        );
        let _ = self
            .event_sender
            .send(Event::SaleCompleted {
                system_id,
                sale_id: result.sale.id,
            })
            .await;
        self.emit_stock_events(&result.items).await;

        Ok(result)
    }

    /// Fetches one sale with its items.
    #[instrument(skip(self))]
    pub async fn get_sale(
        &self,
        principal: &Principal,
        system_id: i64,
        sale_id: i64,
    ) -> Result<SaleWithItems, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::RecordSales).await?;

        let sale_row = find_sale_in_system(db, sale_id, system_id).await?;
        let items = sale_row
            .find_related(sale_item::Entity)
            .order_by_asc(sale_item::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(SaleWithItems {
            sale: sale_row,
            items,
        })
    }

    /// Lists the sales of a system, newest first.
    #[instrument(skip(self))]
    pub async fn list_sales(
        &self,
        principal: &Principal,
        system_id: i64,
    ) -> Result<Vec<sale::Model>, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::RecordSales).await?;

        sale::Entity::find()
            .filter(sale::Column::SystemId.eq(system_id))
            .order_by_desc(sale::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Voids one line of a sale, restoring exactly the batches it consumed
    /// and re-totalling the sale.
    #[instrument(skip(self))]
    pub async fn void_sale_item(
        &self,
        principal: &Principal,
        system_id: i64,
        sale_id: i64,
        sale_item_id: i64,
    ) -> Result<SaleWithItems, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::VoidSales).await?;

        let result = db
            .transaction::<_, SaleWithItems, ServiceError>(move |txn| {
                Box::pin(async move {
                    let sale_row = find_sale_in_system(txn, sale_id, system_id).await?;

                    let item = sale_item::Entity::find_by_id(sale_item_id)
                        .filter(sale_item::Column::SaleId.eq(sale_id))
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Sale item {} not found",
                                sale_item_id
                            ))
                        })?;

                    restore_item_allocations(txn, &item).await?;
                    let product_id = item.product_id;
                    item.delete(txn).await.map_err(ServiceError::db_error)?;
                    inventory::reconcile_product(txn, product_id).await?;

                    let items = sale_item::Entity::find()
                        .filter(sale_item::Column::SaleId.eq(sale_id))
                        .order_by_asc(sale_item::Column::Id)
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    let sale_row = retotal_sale(txn, sale_row, &items).await?;

                    Ok(SaleWithItems {
                        sale: sale_row,
                        items,
                    })
                })
            })
            .await
            .map_err(unwrap_txn_error)?;

        info!("Sale item {} voided on sale {}", sale_item_id, sale_id);
        let _ = self
            .event_sender
            .send(Event::SaleItemVoided {
                sale_id,
                sale_item_id,
            })
            .await;

        Ok(result)
    }

    /// Voids a whole sale, restoring stock for every item.
    #[instrument(skip(self))]
    pub async fn void_sale(
        &self,
        principal: &Principal,
        system_id: i64,
        sale_id: i64,
    ) -> Result<(), ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::VoidSales).await?;

        db.transaction::<_, (), ServiceError>(move |txn| {
            Box::pin(async move {
                let sale_row = find_sale_in_system(txn, sale_id, system_id).await?;

                let items = sale_item::Entity::find()
                    .filter(sale_item::Column::SaleId.eq(sale_id))
                    .all(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                let mut product_ids: Vec<i64> = Vec::new();
                for item in &items {
                    restore_item_allocations(txn, item).await?;
                    if !product_ids.contains(&item.product_id) {
                        product_ids.push(item.product_id);
                    }
                }

                // Items and allocations go with the sale via FK cascade.
                sale_row.delete(txn).await.map_err(ServiceError::db_error)?;

                for product_id in product_ids {
                    inventory::reconcile_product(txn, product_id).await?;
                }
                Ok(())
            })
        })
        .await
        .map_err(unwrap_txn_error)?;

        info!("Sale {} voided", sale_id);
        let _ = self.event_sender.send(Event::SaleVoided(sale_id)).await;
        Ok(())
    }

    async fn emit_stock_events(&self, items: &[sale_item::Model]) {
        let db = self.db.as_ref();
        let mut seen: Vec<i64> = Vec::new();
        for item in items {
            if seen.contains(&item.product_id) {
                continue;
            }
            seen.push(item.product_id);
            if let Ok(Some(product)) = product::Entity::find_by_id(item.product_id)
                .one(db)
                .await
            {
                let _ = self
                    .event_sender
                    .send(Event::StockReconciled {
                        product_id: product.id,
                        stock_quantity: product.stock_quantity,
                    })
                    .await;
                if product.stock_quantity < product.minimum_stock {
                    let _ = self
                        .event_sender
                        .send(Event::LowStock {
                            product_id: product.id,
                            stock_quantity: product.stock_quantity,
                            minimum_stock: product.minimum_stock,
                        })
                        .await;
                }
            }
        }
    }
}

/// Receipt numbers embed the tenant and the moment of sale.
fn generate_receipt_number(system_id: i64) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!(
        "RCP-{}-{}{:03}",
        system_id,
        Utc::now().timestamp_millis(),
        suffix
    )
}

fn unwrap_txn_error(e: TransactionError<ServiceError>) -> ServiceError {
    match e {
        TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}

async fn find_sale_in_system<C: sea_orm::ConnectionTrait>(
    conn: &C,
    sale_id: i64,
    system_id: i64,
) -> Result<sale::Model, ServiceError> {
    sale::Entity::find_by_id(sale_id)
        .filter(sale::Column::SystemId.eq(system_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", sale_id)))
}

/// Sells one line: lock the product row, verify stock, snapshot price and
/// cost, consume batches first-expired-first-out, record the allocations,
/// and reconcile the aggregate.
async fn sell_one_item<C: sea_orm::ConnectionTrait>(
    txn: &C,
    system_id: i64,
    sale_id: i64,
    item: SaleItemInput,
) -> Result<sale_item::Model, ServiceError> {
    // Row lock: concurrent sales serialize on the product for the
    // check-and-decrement. SQLite falls back to transaction-level locking.
    let product = product::Entity::find_by_id(item.product_id)
        .filter(product::Column::SystemId.eq(system_id))
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Product {} not found", item.product_id))
        })?;

    if item.quantity > product.stock_quantity {
        return Err(ServiceError::InsufficientStock(format!(
            "Not enough stock available. Only {} units left.",
            product.stock_quantity
        )));
    }

    let unit_price = item.unit_price.unwrap_or(product.price);
    let discount = item.discount_amount.unwrap_or(Decimal::ZERO);
    if unit_price < Decimal::ZERO || discount < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "unit_price and discount_amount cannot be negative".into(),
        ));
    }
    let total_price = unit_price * Decimal::from(item.quantity) - discount;
    if total_price < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "discount exceeds the line total".into(),
        ));
    }

    let created = sale_item::ActiveModel {
        sale_id: Set(sale_id),
        product_id: Set(product.id),
        quantity: Set(item.quantity),
        unit_price: Set(unit_price),
        unit_cost: Set(product.cost),
        discount_amount: Set(discount),
        total_price: Set(total_price),
        ..Default::default()
    }
    .insert(txn)
    .await
    .map_err(ServiceError::db_error)?;

    // Consume batches earliest-expiry-first and remember where the stock
    // came from.
    let batches = product_batch::Entity::find()
        .filter(product_batch::Column::ProductId.eq(product.id))
        .filter(product_batch::Column::Quantity.gt(0))
        .all(txn)
        .await
        .map_err(ServiceError::db_error)?;

    let plan = inventory::plan_fefo(&batches, item.quantity).ok_or_else(|| {
        ServiceError::InsufficientStock(format!(
            "Not enough stock available. Only {} units left.",
            batches.iter().map(|b| b.quantity).sum::<i32>()
        ))
    })?;

    for (batch_id, take) in plan {
        let batch = batches
            .iter()
            .find(|b| b.id == batch_id)
            .expect("planned batch came from this set");
        let mut active: product_batch::ActiveModel = batch.clone().into();
        active.quantity = Set(batch.quantity - take);
        active.updated_at = Set(Utc::now());
        active.update(txn).await.map_err(ServiceError::db_error)?;

        sale_allocation::ActiveModel {
            sale_item_id: Set(created.id),
            batch_id: Set(batch_id),
            quantity: Set(take),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(ServiceError::db_error)?;
    }

    inventory::reconcile_product(txn, product.id).await?;

    Ok(created)
}

/// Puts an item's consumed quantities back on the batches they came from.
async fn restore_item_allocations<C: sea_orm::ConnectionTrait>(
    txn: &C,
    item: &sale_item::Model,
) -> Result<(), ServiceError> {
    let allocations = sale_allocation::Entity::find()
        .filter(sale_allocation::Column::SaleItemId.eq(item.id))
        .all(txn)
        .await
        .map_err(ServiceError::db_error)?;

    for allocation in allocations {
        let batch = product_batch::Entity::find_by_id(allocation.batch_id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "batch {} referenced by allocation {} is missing",
                    allocation.batch_id, allocation.id
                ))
            })?;
        let restored_quantity = batch.quantity + allocation.quantity;
        let mut active: product_batch::ActiveModel = batch.into();
        active.quantity = Set(restored_quantity);
        active.updated_at = Set(Utc::now());
        active.update(txn).await.map_err(ServiceError::db_error)?;
    }
    Ok(())
}

/// Recomputes a sale's subtotal, VAT, and total from its items.
async fn retotal_sale<C: sea_orm::ConnectionTrait>(
    txn: &C,
    sale_row: sale::Model,
    items: &[sale_item::Model],
) -> Result<sale::Model, ServiceError> {
    let subtotal: Decimal = items.iter().map(|i| i.total_price).sum();
    let vat_amount = (subtotal * sale_row.vat_rate).round_dp(2);
    let total_price = subtotal + vat_amount - sale_row.discount_amount;

    let mut active: sale::ActiveModel = sale_row.into();
    active.vat_amount = Set(vat_amount);
    active.total_price = Set(total_price);
    active.update(txn).await.map_err(ServiceError::db_error)
}
