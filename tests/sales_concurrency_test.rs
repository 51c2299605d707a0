mod common;

use rust_decimal_macros::dec;
use storefront_api::{
    entities::sale::PaymentType,
    services::{
        receiving::RecordReceiptInput,
        sales::{CreateSaleInput, SaleItemInput},
    },
};

use common::TestApp;

// This test is ignored by default: the no-oversell guarantee relies on
// row-level locking, which SQLite approximates with whole-database locking
// and reports as transient "database is locked" failures under contention.
// Run against Postgres for a faithful exercise:
// cargo test -- --ignored sales_never_oversell
#[tokio::test]
#[ignore]
async fn sales_never_oversell_under_concurrency() {
    let app = TestApp::new().await;
    let system = app.create_supermarket("Corner Market").await;
    let product = app.create_product(system.id, "Milk 1L", dec!(2.00)).await;
    let supplier = app.create_supplier(system.id, "Dairy Co").await;
    let po = app
        .create_purchase_order(system.id, supplier.id, product.id, 10, dec!(1.00))
        .await;
    app.services
        .receiving
        .record_receipt(
            &app.owner,
            system.id,
            po.id,
            RecordReceiptInput {
                received_quantity: 10,
                received_date: None,
                expiry_date: None,
                location: None,
            },
        )
        .await
        .expect("seed receipt");

    // Try 20 concurrent sales of 1 unit each; expect exactly 10 successes.
    let mut tasks = vec![];
    for _ in 0..20 {
        let sales = app.services.sales.clone();
        let owner = app.owner;
        let system_id = system.id;
        let product_id = product.id;
        tasks.push(tokio::spawn(async move {
            sales
                .create_sale(
                    &owner,
                    system_id,
                    CreateSaleInput {
                        cashier_employee_id: None,
                        payment_type: PaymentType::Cash,
                        discount_amount: None,
                        vat_rate: None,
                        items: vec![SaleItemInput {
                            product_id,
                            quantity: 1,
                            unit_price: None,
                            discount_amount: None,
                        }],
                    },
                )
                .await
                .is_ok()
        }));
    }

    let mut success = 0;
    for task in tasks {
        if task.await.unwrap_or(false) {
            success += 1;
        }
    }

    assert_eq!(
        success, 10,
        "exactly 10 unit sales should succeed; got {}",
        success
    );
    assert_eq!(app.reload_product(product.id).await.stock_quantity, 0);
    assert_eq!(app.batch_stock(product.id).await, 0);
}
