mod common;

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use storefront_api::{
    entities::purchase_order::PurchaseOrderStatus,
    errors::ServiceError,
    services::receiving::{RecordReceiptInput, UpdateReceiptInput},
};

use common::TestApp;

fn receipt_of(quantity: i32) -> RecordReceiptInput {
    RecordReceiptInput {
        received_quantity: quantity,
        received_date: None,
        expiry_date: None,
        location: None,
    }
}

#[tokio::test]
async fn partial_then_full_receipt_drives_status_and_stock() {
    let app = TestApp::new().await;
    let system = app.create_supermarket("Corner Market").await;
    let product = app.create_product(system.id, "Long-life Milk", dec!(3.20)).await;
    let supplier = app.create_supplier(system.id, "Dairy Co").await;
    let po = app
        .create_purchase_order(system.id, supplier.id, product.id, 100, dec!(2.10))
        .await;

    // Receive 50 of 100.
    let outcome = app
        .services
        .receiving
        .record_receipt(&app.owner, system.id, po.id, receipt_of(50))
        .await
        .expect("first receipt");
    assert_eq!(
        outcome.purchase_order.status,
        PurchaseOrderStatus::PartiallyReceived
    );
    assert_eq!(outcome.product.stock_quantity, 50);

    // Receive the remaining 50.
    let outcome = app
        .services
        .receiving
        .record_receipt(&app.owner, system.id, po.id, receipt_of(50))
        .await
        .expect("second receipt");
    assert_eq!(outcome.purchase_order.status, PurchaseOrderStatus::Completed);
    assert_eq!(outcome.product.stock_quantity, 100);

    // The aggregate always equals the batch sum.
    assert_eq!(app.batch_stock(product.id).await, 100);
}

#[tokio::test]
async fn over_receipt_is_rejected_without_state_change() {
    let app = TestApp::new().await;
    let system = app.create_supermarket("Corner Market").await;
    let product = app.create_product(system.id, "Rice 5kg", dec!(9.99)).await;
    let supplier = app.create_supplier(system.id, "Grain Traders").await;
    let po = app
        .create_purchase_order(system.id, supplier.id, product.id, 100, dec!(6.00))
        .await;

    let err = app
        .services
        .receiving
        .record_receipt(&app.owner, system.id, po.id, receipt_of(120))
        .await
        .expect_err("over-receipt must fail");
    assert!(matches!(err, ServiceError::ValidationError(_)));

    assert_eq!(app.reload_product(product.id).await.stock_quantity, 0);
    assert_eq!(
        app.reload_purchase_order(po.id).await.status,
        PurchaseOrderStatus::Pending
    );
}

#[tokio::test]
async fn deleting_a_receipt_reverts_status_and_stock() {
    let app = TestApp::new().await;
    let system = app.create_supermarket("Corner Market").await;
    let product = app.create_product(system.id, "Olive Oil", dec!(12.00)).await;
    let supplier = app.create_supplier(system.id, "Import House").await;
    let po = app
        .create_purchase_order(system.id, supplier.id, product.id, 100, dec!(8.00))
        .await;

    app.services
        .receiving
        .record_receipt(&app.owner, system.id, po.id, receipt_of(50))
        .await
        .expect("first receipt");
    let second = app
        .services
        .receiving
        .record_receipt(&app.owner, system.id, po.id, receipt_of(50))
        .await
        .expect("second receipt");
    assert_eq!(second.purchase_order.status, PurchaseOrderStatus::Completed);

    // Dropping the second delivery takes the order back to partial.
    let outcome = app
        .services
        .receiving
        .delete_receipt(&app.owner, system.id, second.receipt.id)
        .await
        .expect("delete receipt");
    assert_eq!(
        outcome.purchase_order.status,
        PurchaseOrderStatus::PartiallyReceived
    );
    assert_eq!(outcome.product.stock_quantity, 50);
    assert_eq!(app.batch_stock(product.id).await, 50);
}

#[tokio::test]
async fn create_then_delete_is_idempotent() {
    let app = TestApp::new().await;
    let system = app.create_supermarket("Corner Market").await;
    let product = app.create_product(system.id, "Butter", dec!(4.50)).await;
    let supplier = app.create_supplier(system.id, "Dairy Co").await;
    let po = app
        .create_purchase_order(system.id, supplier.id, product.id, 80, dec!(3.00))
        .await;

    let stock_before = app.reload_product(product.id).await.stock_quantity;
    let status_before = app.reload_purchase_order(po.id).await.status;

    let outcome = app
        .services
        .receiving
        .record_receipt(&app.owner, system.id, po.id, receipt_of(30))
        .await
        .expect("receipt");
    app.services
        .receiving
        .delete_receipt(&app.owner, system.id, outcome.receipt.id)
        .await
        .expect("delete");

    assert_eq!(
        app.reload_product(product.id).await.stock_quantity,
        stock_before
    );
    assert_eq!(app.reload_purchase_order(po.id).await.status, status_before);
}

#[tokio::test]
async fn updating_a_receipt_replaces_the_old_effect() {
    let app = TestApp::new().await;
    let system = app.create_supermarket("Corner Market").await;
    let product = app.create_product(system.id, "Flour 2kg", dec!(2.80)).await;
    let supplier = app.create_supplier(system.id, "Grain Traders").await;
    let po = app
        .create_purchase_order(system.id, supplier.id, product.id, 100, dec!(1.90))
        .await;

    let outcome = app
        .services
        .receiving
        .record_receipt(&app.owner, system.id, po.id, receipt_of(40))
        .await
        .expect("receipt");

    let outcome = app
        .services
        .receiving
        .update_receipt(
            &app.owner,
            system.id,
            outcome.receipt.id,
            UpdateReceiptInput {
                received_quantity: Some(70),
                ..Default::default()
            },
        )
        .await
        .expect("update");

    assert_eq!(outcome.receipt.received_quantity, 70);
    assert_eq!(outcome.product.stock_quantity, 70);
    assert_eq!(app.batch_stock(product.id).await, 70);
    assert_eq!(
        outcome.purchase_order.status,
        PurchaseOrderStatus::PartiallyReceived
    );

    // Updating past the ordered quantity is rejected.
    let err = app
        .services
        .receiving
        .update_receipt(
            &app.owner,
            system.id,
            outcome.receipt.id,
            UpdateReceiptInput {
                received_quantity: Some(130),
                ..Default::default()
            },
        )
        .await
        .expect_err("over-receipt update must fail");
    assert!(matches!(err, ServiceError::ValidationError(_)));
    assert_eq!(app.reload_product(product.id).await.stock_quantity, 70);
}

#[tokio::test]
async fn product_expiry_tracks_earliest_batch_with_stock() {
    let app = TestApp::new().await;
    let system = app.create_supermarket("Corner Market").await;
    let product = app.create_product(system.id, "Yogurt", dec!(1.50)).await;
    let supplier = app.create_supplier(system.id, "Dairy Co").await;
    let po = app
        .create_purchase_order(system.id, supplier.id, product.id, 100, dec!(0.90))
        .await;

    let today = Utc::now().date_naive();
    let near = today + Duration::days(5);
    let far = today + Duration::days(40);

    app.services
        .receiving
        .record_receipt(
            &app.owner,
            system.id,
            po.id,
            RecordReceiptInput {
                received_quantity: 20,
                received_date: None,
                expiry_date: Some(far),
                location: None,
            },
        )
        .await
        .expect("far receipt");
    let near_receipt = app
        .services
        .receiving
        .record_receipt(
            &app.owner,
            system.id,
            po.id,
            RecordReceiptInput {
                received_quantity: 10,
                received_date: None,
                expiry_date: Some(near),
                location: None,
            },
        )
        .await
        .expect("near receipt");

    assert_eq!(near_receipt.product.expiry_date, Some(near));

    // Removing the near batch moves the derived expiry to the next one.
    let outcome = app
        .services
        .receiving
        .delete_receipt(&app.owner, system.id, near_receipt.receipt.id)
        .await
        .expect("delete near receipt");
    assert_eq!(outcome.product.expiry_date, Some(far));
    assert_eq!(outcome.product.stock_quantity, 20);
}

#[tokio::test]
async fn cancelled_order_rejects_receipts() {
    let app = TestApp::new().await;
    let system = app.create_supermarket("Corner Market").await;
    let product = app.create_product(system.id, "Soap", dec!(1.00)).await;
    let supplier = app.create_supplier(system.id, "Household Goods").await;
    let po = app
        .create_purchase_order(system.id, supplier.id, product.id, 50, dec!(0.60))
        .await;

    app.services
        .purchase_orders
        .cancel_purchase_order(&app.owner, system.id, po.id)
        .await
        .expect("cancel");

    let err = app
        .services
        .receiving
        .record_receipt(&app.owner, system.id, po.id, receipt_of(10))
        .await
        .expect_err("receipt against cancelled order must fail");
    assert!(matches!(err, ServiceError::InvalidOperation(_)));
}

#[tokio::test]
async fn past_expiry_date_is_rejected() {
    let app = TestApp::new().await;
    let system = app.create_supermarket("Corner Market").await;
    let product = app.create_product(system.id, "Cream", dec!(2.00)).await;
    let supplier = app.create_supplier(system.id, "Dairy Co").await;
    let po = app
        .create_purchase_order(system.id, supplier.id, product.id, 50, dec!(1.20))
        .await;

    let err = app
        .services
        .receiving
        .record_receipt(
            &app.owner,
            system.id,
            po.id,
            RecordReceiptInput {
                received_quantity: 10,
                received_date: None,
                expiry_date: Some(Utc::now().date_naive() - Duration::days(1)),
                location: None,
            },
        )
        .await
        .expect_err("past expiry must fail");
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn receipts_are_scoped_to_their_tenant() {
    let app = TestApp::new().await;
    let system_a = app.create_supermarket("Market A").await;
    let system_b = app.create_supermarket("Market B").await;
    let product = app.create_product(system_a.id, "Tea", dec!(2.00)).await;
    let supplier = app.create_supplier(system_a.id, "Tea Traders").await;
    let po = app
        .create_purchase_order(system_a.id, supplier.id, product.id, 50, dec!(1.10))
        .await;

    let outcome = app
        .services
        .receiving
        .record_receipt(&app.owner, system_a.id, po.id, receipt_of(10))
        .await
        .expect("receipt");

    // The same receipt id does not resolve under another tenant.
    let err = app
        .services
        .receiving
        .delete_receipt(&app.owner, system_b.id, outcome.receipt.id)
        .await
        .expect_err("cross-tenant receipt access must fail");
    assert!(matches!(err, ServiceError::NotFound(_)));
}
