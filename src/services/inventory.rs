//! Inventory reconciliation engine.
//!
//! Derived product fields (`stock_quantity`, `expiry_date`) are recomputed
//! in exactly one place: [`reconcile_product`], invoked once per transaction
//! after all batch mutations. The purchase-order status machine and the
//! first-expired-first-out consumption planner live here as pure functions
//! so they can be tested without a database.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};

use crate::entities::{product, product_batch, purchase_order::PurchaseOrderStatus};
use crate::errors::ServiceError;

/// Derives the purchase-order status from ordered vs. received quantities.
///
/// `cancelled` is never produced here; it is terminal and only reachable
/// through the explicit cancel operation.
pub fn derive_status(ordered: i32, total_received: i32) -> PurchaseOrderStatus {
    if total_received >= ordered {
        PurchaseOrderStatus::Completed
    } else if total_received > 0 {
        PurchaseOrderStatus::PartiallyReceived
    } else {
        PurchaseOrderStatus::Pending
    }
}

/// Plans a first-expired-first-out consumption of `requested` units across
/// the given batches. Batches with no expiry date sort after dated ones;
/// ties break on creation order. Returns `(batch_id, take)` pairs, or `None`
/// when the batches cannot cover the request.
pub fn plan_fefo(
    batches: &[product_batch::Model],
    requested: i32,
) -> Option<Vec<(i64, i32)>> {
    let mut available: Vec<&product_batch::Model> =
        batches.iter().filter(|b| b.quantity > 0).collect();
    available.sort_by(|a, b| {
        let a_key = (a.expiry_date.is_none(), a.expiry_date, a.created_at, a.id);
        let b_key = (b.expiry_date.is_none(), b.expiry_date, b.created_at, b.id);
        a_key.cmp(&b_key)
    });

    let mut remaining = requested;
    let mut plan = Vec::new();
    for batch in available {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(batch.quantity);
        plan.push((batch.id, take));
        remaining -= take;
    }

    if remaining > 0 {
        None
    } else {
        Some(plan)
    }
}

/// Sums received quantities across all receipts of a purchase order.
pub(crate) async fn total_received<C: ConnectionTrait>(
    conn: &C,
    purchase_order_id: i64,
) -> Result<i32, ServiceError> {
    use crate::entities::goods_receipt;

    let receipts = goods_receipt::Entity::find()
        .filter(goods_receipt::Column::PurchaseOrderId.eq(purchase_order_id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(receipts.iter().map(|r| r.received_quantity).sum())
}

/// Finds the batch keyed by `(product, purchase order, expiry date)`.
pub(crate) async fn find_batch<C: ConnectionTrait>(
    conn: &C,
    product_id: i64,
    purchase_order_id: i64,
    expiry_date: Option<chrono::NaiveDate>,
) -> Result<Option<product_batch::Model>, ServiceError> {
    let mut query = product_batch::Entity::find()
        .filter(product_batch::Column::ProductId.eq(product_id))
        .filter(product_batch::Column::PurchaseOrderId.eq(purchase_order_id));

    query = match expiry_date {
        Some(date) => query.filter(product_batch::Column::ExpiryDate.eq(date)),
        None => query.filter(product_batch::Column::ExpiryDate.is_null()),
    };

    query.one(conn).await.map_err(ServiceError::db_error)
}

/// Applies a signed quantity delta to the batch keyed by
/// `(product, purchase order, expiry date)`, creating the batch on first
/// receipt. A delta that would drive the batch negative means the received
/// stock was already sold and is rejected.
pub(crate) async fn apply_batch_delta<C: ConnectionTrait>(
    conn: &C,
    product_id: i64,
    purchase_order_id: i64,
    expiry_date: Option<chrono::NaiveDate>,
    delta: i32,
) -> Result<product_batch::Model, ServiceError> {
    match find_batch(conn, product_id, purchase_order_id, expiry_date).await? {
        Some(batch) => {
            let new_quantity = batch.quantity + delta;
            if new_quantity < 0 {
                return Err(ServiceError::Conflict(format!(
                    "batch {} holds {} units; {} of the received stock has already been sold",
                    batch.id,
                    batch.quantity,
                    delta.unsigned_abs()
                )));
            }
            let mut active: product_batch::ActiveModel = batch.into();
            active.quantity = Set(new_quantity);
            active.updated_at = Set(Utc::now());
            active.update(conn).await.map_err(ServiceError::db_error)
        }
        None => {
            if delta < 0 {
                return Err(ServiceError::InternalError(format!(
                    "no batch found for product {} / purchase order {} to reverse",
                    product_id, purchase_order_id
                )));
            }
            let now = Utc::now();
            let active = product_batch::ActiveModel {
                product_id: Set(product_id),
                purchase_order_id: Set(purchase_order_id),
                quantity: Set(delta),
                expiry_date: Set(expiry_date),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };
            active.insert(conn).await.map_err(ServiceError::db_error)
        }
    }
}

/// Recomputes the derived product aggregate from its batch set and persists
/// it: `stock_quantity` is the sum of positive batch quantities and
/// `expiry_date` the earliest expiry among batches with stock.
pub(crate) async fn reconcile_product<C: ConnectionTrait>(
    conn: &C,
    product_id: i64,
) -> Result<product::Model, ServiceError> {
    let existing = product::Entity::find_by_id(product_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

    let batches = product_batch::Entity::find()
        .filter(product_batch::Column::ProductId.eq(product_id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    let stock_quantity: i32 = batches
        .iter()
        .filter(|b| b.quantity > 0)
        .map(|b| b.quantity)
        .sum();
    let expiry_date = batches
        .iter()
        .filter(|b| b.quantity > 0)
        .filter_map(|b| b.expiry_date)
        .min();

    let mut active: product::ActiveModel = existing.into();
    active.stock_quantity = Set(stock_quantity);
    active.expiry_date = Set(expiry_date);
    active.updated_at = Set(Utc::now());
    active.update(conn).await.map_err(ServiceError::db_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, Utc};

    fn batch(
        id: i64,
        quantity: i32,
        expiry_date: Option<NaiveDate>,
        age_days: i64,
    ) -> product_batch::Model {
        product_batch::Model {
            id,
            product_id: 1,
            purchase_order_id: 1,
            quantity,
            expiry_date,
            created_at: Utc::now() - Duration::days(age_days),
            updated_at: Utc::now(),
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn status_pending_when_nothing_received() {
        assert_eq!(derive_status(100, 0), PurchaseOrderStatus::Pending);
    }

    #[test]
    fn status_partial_when_under_ordered() {
        assert_eq!(derive_status(100, 1), PurchaseOrderStatus::PartiallyReceived);
        assert_eq!(
            derive_status(100, 99),
            PurchaseOrderStatus::PartiallyReceived
        );
    }

    #[test]
    fn status_completed_at_or_over_ordered() {
        assert_eq!(derive_status(100, 100), PurchaseOrderStatus::Completed);
        assert_eq!(derive_status(100, 150), PurchaseOrderStatus::Completed);
    }

    #[test]
    fn fefo_prefers_earliest_expiry() {
        let batches = vec![
            batch(1, 10, Some(date("2025-09-01")), 1),
            batch(2, 10, Some(date("2025-08-01")), 5),
        ];
        let plan = plan_fefo(&batches, 12).unwrap();
        assert_eq!(plan, vec![(2, 10), (1, 2)]);
    }

    #[test]
    fn fefo_puts_undated_batches_last() {
        let batches = vec![
            batch(1, 10, None, 10),
            batch(2, 10, Some(date("2025-12-01")), 1),
        ];
        let plan = plan_fefo(&batches, 15).unwrap();
        assert_eq!(plan, vec![(2, 10), (1, 5)]);
    }

    #[test]
    fn fefo_breaks_expiry_ties_on_age() {
        let expiry = Some(date("2025-10-01"));
        let batches = vec![batch(1, 5, expiry, 1), batch(2, 5, expiry, 9)];
        let plan = plan_fefo(&batches, 6).unwrap();
        assert_eq!(plan, vec![(2, 5), (1, 1)]);
    }

    #[test]
    fn fefo_skips_empty_batches() {
        let batches = vec![
            batch(1, 0, Some(date("2025-01-01")), 9),
            batch(2, 8, Some(date("2025-11-01")), 1),
        ];
        let plan = plan_fefo(&batches, 8).unwrap();
        assert_eq!(plan, vec![(2, 8)]);
    }

    #[test]
    fn fefo_fails_when_short() {
        let batches = vec![batch(1, 3, None, 1)];
        assert!(plan_fefo(&batches, 4).is_none());
    }

    #[test]
    fn fefo_exact_fit() {
        let batches = vec![batch(1, 4, None, 1)];
        assert_eq!(plan_fefo(&batches, 4).unwrap(), vec![(1, 4)]);
    }
}
