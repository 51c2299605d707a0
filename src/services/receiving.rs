use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionError, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::access::{Action, Principal};
use crate::entities::{
    goods_receipt::{self, DEFAULT_LOCATION},
    product,
    purchase_order::{self, PurchaseOrderStatus},
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::{inventory, require_system_access};

#[derive(Debug, Clone)]
pub struct RecordReceiptInput {
    pub received_quantity: i32,
    pub received_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub location: Option<String>,
}

/// Absent fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateReceiptInput {
    pub received_quantity: Option<i32>,
    pub received_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub location: Option<String>,
}

/// A receipt mutation together with the state it left behind: the
/// reconciled product aggregate and any purchase-order status transition.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReceiptOutcome {
    pub receipt: goods_receipt::Model,
    pub product: product::Model,
    pub purchase_order: purchase_order::Model,
}

struct StatusChange {
    old: PurchaseOrderStatus,
    new: PurchaseOrderStatus,
}

/// Service for goods receiving against purchase orders.
///
/// Every mutation runs in one transaction: adjust the matching product
/// batch, recompute the purchase-order status from the surviving receipts,
/// and reconcile the product aggregate. Either all of it commits or none.
#[derive(Clone)]
pub struct ReceivingService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl ReceivingService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Records one delivery against a purchase order.
    #[instrument(skip(self))]
    pub async fn record_receipt(
        &self,
        principal: &Principal,
        system_id: i64,
        purchase_order_id: i64,
        input: RecordReceiptInput,
    ) -> Result<ReceiptOutcome, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ReceiveGoods).await?;

        if input.received_quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "received_quantity must be greater than zero".into(),
            ));
        }
        let today = Utc::now().date_naive();
        if let Some(expiry) = input.expiry_date {
            if expiry < today {
                return Err(ServiceError::ValidationError(
                    "expiry_date is in the past".into(),
                ));
            }
        }

        let (outcome, status_change) = db
            .transaction::<_, (ReceiptOutcome, Option<StatusChange>), ServiceError>(move |txn| {
                Box::pin(async move {
                    let po = find_order_in_system(txn, purchase_order_id, system_id).await?;
                    if po.status == PurchaseOrderStatus::Cancelled {
                        return Err(ServiceError::InvalidOperation(
                            "cannot receive against a cancelled purchase order".into(),
                        ));
                    }

                    let already_received = inventory::total_received(txn, po.id).await?;
                    if already_received + input.received_quantity > po.quantity {
                        return Err(ServiceError::ValidationError(format!(
                            "received quantity exceeds remaining order quantity: ordered {}, already received {}, receiving {}",
                            po.quantity, already_received, input.received_quantity
                        )));
                    }

                    let now = Utc::now();
                    let receipt = goods_receipt::ActiveModel {
                        purchase_order_id: Set(po.id),
                        received_quantity: Set(input.received_quantity),
                        received_date: Set(input.received_date.unwrap_or(today)),
                        expiry_date: Set(input.expiry_date),
                        location: Set(input
                            .location
                            .unwrap_or_else(|| DEFAULT_LOCATION.to_string())),
                        created_at: Set(now),
                        updated_at: Set(now),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    inventory::apply_batch_delta(
                        txn,
                        po.product_id,
                        po.id,
                        input.expiry_date,
                        input.received_quantity,
                    )
                    .await?;

                    let total = inventory::total_received(txn, po.id).await?;
                    let (po, status_change) = apply_derived_status(txn, po, total).await?;

                    let product = inventory::reconcile_product(txn, po.product_id).await?;

                    Ok((
                        ReceiptOutcome {
                            receipt,
                            product,
                            purchase_order: po,
                        },
                        status_change,
                    ))
                })
            })
            .await
            .map_err(unwrap_txn_error)?;

        info!(
            "Goods receipt {} recorded against purchase order {}",
            outcome.receipt.id, purchase_order_id
        );
        self.emit_receipt_events(
            Event::GoodsReceiptRecorded {
                purchase_order_id,
                receipt_id: outcome.receipt.id,
                quantity: outcome.receipt.received_quantity,
            },
            &outcome,
            status_change,
        )
        .await;

        Ok(outcome)
    }

    /// Replaces a receipt's quantity or expiry. The previous values come
    /// from the row already in hand; the old effect is reversed and the new
    /// one applied inside one transaction.
    #[instrument(skip(self))]
    pub async fn update_receipt(
        &self,
        principal: &Principal,
        system_id: i64,
        receipt_id: i64,
        input: UpdateReceiptInput,
    ) -> Result<ReceiptOutcome, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ReceiveGoods).await?;

        if let Some(quantity) = input.received_quantity {
            if quantity <= 0 {
                return Err(ServiceError::ValidationError(
                    "received_quantity must be greater than zero".into(),
                ));
            }
        }
        let today = Utc::now().date_naive();
        if let Some(expiry) = input.expiry_date {
            if expiry < today {
                return Err(ServiceError::ValidationError(
                    "expiry_date is in the past".into(),
                ));
            }
        }

        let (outcome, status_change) = db
            .transaction::<_, (ReceiptOutcome, Option<StatusChange>), ServiceError>(move |txn| {
                Box::pin(async move {
                    let (receipt, po) =
                        find_receipt_in_system(txn, receipt_id, system_id).await?;

                    let old_quantity = receipt.received_quantity;
                    let old_expiry = receipt.expiry_date;
                    let new_quantity = input.received_quantity.unwrap_or(old_quantity);
                    let new_expiry = input.expiry_date.or(old_expiry);

                    let other_receipts =
                        inventory::total_received(txn, po.id).await? - old_quantity;
                    if other_receipts + new_quantity > po.quantity {
                        return Err(ServiceError::ValidationError(format!(
                            "received quantity exceeds remaining order quantity: ordered {}, other receipts {}, receiving {}",
                            po.quantity, other_receipts, new_quantity
                        )));
                    }

                    // Reverse the previous effect, then apply the new one.
                    // Same batch key: one net delta, so shrinking a receipt
                    // works as long as the remaining batch can absorb it.
                    if old_expiry == new_expiry {
                        let net = new_quantity - old_quantity;
                        if net != 0 {
                            inventory::apply_batch_delta(
                                txn,
                                po.product_id,
                                po.id,
                                old_expiry,
                                net,
                            )
                            .await?;
                        }
                    } else {
                        inventory::apply_batch_delta(
                            txn,
                            po.product_id,
                            po.id,
                            old_expiry,
                            -old_quantity,
                        )
                        .await?;
                        inventory::apply_batch_delta(
                            txn,
                            po.product_id,
                            po.id,
                            new_expiry,
                            new_quantity,
                        )
                        .await?;
                    }

                    let mut active: goods_receipt::ActiveModel = receipt.into();
                    active.received_quantity = Set(new_quantity);
                    if let Some(received_date) = input.received_date {
                        active.received_date = Set(received_date);
                    }
                    active.expiry_date = Set(new_expiry);
                    if let Some(location) = input.location {
                        active.location = Set(location);
                    }
                    active.updated_at = Set(Utc::now());
                    let receipt = active.update(txn).await.map_err(ServiceError::db_error)?;

                    let total = inventory::total_received(txn, po.id).await?;
                    let (po, status_change) = apply_derived_status(txn, po, total).await?;

                    let product = inventory::reconcile_product(txn, po.product_id).await?;

                    Ok((
                        ReceiptOutcome {
                            receipt,
                            product,
                            purchase_order: po,
                        },
                        status_change,
                    ))
                })
            })
            .await
            .map_err(unwrap_txn_error)?;

        info!("Goods receipt {} updated", receipt_id);
        self.emit_receipt_events(
            Event::GoodsReceiptUpdated { receipt_id },
            &outcome,
            status_change,
        )
        .await;

        Ok(outcome)
    }

    /// Deletes a receipt, reversing its batch effect and reverting the
    /// purchase-order status derived from the remaining receipts.
    #[instrument(skip(self))]
    pub async fn delete_receipt(
        &self,
        principal: &Principal,
        system_id: i64,
        receipt_id: i64,
    ) -> Result<ReceiptOutcome, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ReceiveGoods).await?;

        let (outcome, status_change) = db
            .transaction::<_, (ReceiptOutcome, Option<StatusChange>), ServiceError>(move |txn| {
                Box::pin(async move {
                    let (receipt, po) =
                        find_receipt_in_system(txn, receipt_id, system_id).await?;

                    inventory::apply_batch_delta(
                        txn,
                        po.product_id,
                        po.id,
                        receipt.expiry_date,
                        -receipt.received_quantity,
                    )
                    .await?;

                    let snapshot = receipt.clone();
                    receipt.delete(txn).await.map_err(ServiceError::db_error)?;

                    let total = inventory::total_received(txn, po.id).await?;
                    let (po, status_change) = apply_derived_status(txn, po, total).await?;

                    let product = inventory::reconcile_product(txn, po.product_id).await?;

                    Ok((
                        ReceiptOutcome {
                            receipt: snapshot,
                            product,
                            purchase_order: po,
                        },
                        status_change,
                    ))
                })
            })
            .await
            .map_err(unwrap_txn_error)?;

        info!("Goods receipt {} deleted", receipt_id);
        self.emit_receipt_events(
            Event::GoodsReceiptDeleted { receipt_id },
            &outcome,
            status_change,
        )
        .await;

        Ok(outcome)
    }

    /// Lists the receipts recorded against a purchase order.
    #[instrument(skip(self))]
    pub async fn list_receipts(
        &self,
        principal: &Principal,
        system_id: i64,
        purchase_order_id: i64,
    ) -> Result<Vec<goods_receipt::Model>, ServiceError> {
        let db = self.db.as_ref();
        require_system_access(db, principal, system_id, Action::ReceiveGoods).await?;

        find_order_in_system(db, purchase_order_id, system_id).await?;

        goods_receipt::Entity::find()
            .filter(goods_receipt::Column::PurchaseOrderId.eq(purchase_order_id))
            .order_by_asc(goods_receipt::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    async fn emit_receipt_events(
        &self,
        event: Event,
        outcome: &ReceiptOutcome,
        status_change: Option<StatusChange>,
    ) {
        let _ = self.event_sender.send(event).await;
        if let Some(change) = status_change {
            let _ = self
                .event_sender
                .send(Event::PurchaseOrderStatusChanged {
                    purchase_order_id: outcome.purchase_order.id,
                    old_status: change.old.to_string(),
                    new_status: change.new.to_string(),
                })
                .await;
        }
        let _ = self
            .event_sender
            .send(Event::StockReconciled {
                product_id: outcome.product.id,
                stock_quantity: outcome.product.stock_quantity,
            })
            .await;
        if outcome.product.stock_quantity < outcome.product.minimum_stock {
            let _ = self
                .event_sender
                .send(Event::LowStock {
                    product_id: outcome.product.id,
                    stock_quantity: outcome.product.stock_quantity,
                    minimum_stock: outcome.product.minimum_stock,
                })
                .await;
        }
    }
}

fn unwrap_txn_error(e: TransactionError<ServiceError>) -> ServiceError {
    match e {
        TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}

async fn find_order_in_system<C: sea_orm::ConnectionTrait>(
    conn: &C,
    purchase_order_id: i64,
    system_id: i64,
) -> Result<purchase_order::Model, ServiceError> {
    purchase_order::Entity::find_by_id(purchase_order_id)
        .filter(purchase_order::Column::SystemId.eq(system_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Purchase order {} not found", purchase_order_id))
        })
}

async fn find_receipt_in_system<C: sea_orm::ConnectionTrait>(
    conn: &C,
    receipt_id: i64,
    system_id: i64,
) -> Result<(goods_receipt::Model, purchase_order::Model), ServiceError> {
    let receipt = goods_receipt::Entity::find_by_id(receipt_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Goods receipt {} not found", receipt_id)))?;

    // Cross-tenant receipts are indistinguishable from missing ones.
    let po = match find_order_in_system(conn, receipt.purchase_order_id, system_id).await {
        Ok(po) => po,
        Err(ServiceError::NotFound(_)) => {
            return Err(ServiceError::NotFound(format!(
                "Goods receipt {} not found",
                receipt_id
            )))
        }
        Err(err) => return Err(err),
    };

    Ok((receipt, po))
}

/// Writes the status derived from `total_received`, unless the order is
/// cancelled (terminal). Returns the possibly-updated order and the
/// transition, if one happened.
async fn apply_derived_status<C: sea_orm::ConnectionTrait>(
    conn: &C,
    po: purchase_order::Model,
    total_received: i32,
) -> Result<(purchase_order::Model, Option<StatusChange>), ServiceError> {
    if po.status == PurchaseOrderStatus::Cancelled {
        return Ok((po, None));
    }

    let derived = inventory::derive_status(po.quantity, total_received);
    if derived == po.status {
        return Ok((po, None));
    }

    let old = po.status;
    let mut active: purchase_order::ActiveModel = po.into();
    active.status = Set(derived);
    active.updated_at = Set(Utc::now());
    let updated = active.update(conn).await.map_err(ServiceError::db_error)?;

    Ok((
        updated,
        Some(StatusChange {
            old,
            new: derived,
        }),
    ))
}
