mod common;

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use storefront_api::{
    entities::{product_batch, sale::PaymentType},
    errors::ServiceError,
    services::{
        receiving::RecordReceiptInput,
        sales::{CreateSaleInput, SaleItemInput},
    },
};

use common::TestApp;

fn one_item_sale(product_id: i64, quantity: i32) -> CreateSaleInput {
    CreateSaleInput {
        cashier_employee_id: None,
        payment_type: PaymentType::Cash,
        discount_amount: None,
        vat_rate: None,
        items: vec![SaleItemInput {
            product_id,
            quantity,
            unit_price: None,
            discount_amount: None,
        }],
    }
}

/// Seeds a product with `quantity` units of stock through a purchase order
/// and one goods receipt, the only way stock enters the system.
async fn seed_stock(app: &TestApp, system_id: i64, product_id: i64, quantity: i32) {
    let supplier = app
        .create_supplier(system_id, &format!("Seed Supplier {}", product_id))
        .await;
    let po = app
        .create_purchase_order(system_id, supplier.id, product_id, quantity, dec!(1.00))
        .await;
    app.services
        .receiving
        .record_receipt(
            &app.owner,
            system_id,
            po.id,
            RecordReceiptInput {
                received_quantity: quantity,
                received_date: None,
                expiry_date: None,
                location: None,
            },
        )
        .await
        .expect("seed receipt");
}

#[tokio::test]
async fn sale_deducts_stock_and_rejects_oversell() {
    let app = TestApp::new().await;
    let system = app.create_supermarket("Corner Market").await;
    let product = app.create_product(system.id, "Milk 1L", dec!(2.00)).await;
    seed_stock(&app, system.id, product.id, 100).await;

    let result = app
        .services
        .sales
        .create_sale(&app.owner, system.id, one_item_sale(product.id, 30))
        .await
        .expect("sale of 30");
    assert_eq!(app.reload_product(product.id).await.stock_quantity, 70);
    assert_eq!(result.items.len(), 1);

    // 71 more would overdraw the remaining 70.
    let err = app
        .services
        .sales
        .create_sale(&app.owner, system.id, one_item_sale(product.id, 71))
        .await
        .expect_err("oversell must fail");
    assert!(matches!(err, ServiceError::InsufficientStock(_)));
    assert_eq!(app.reload_product(product.id).await.stock_quantity, 70);
}

#[tokio::test]
async fn sale_snapshots_price_and_cost_and_totals_with_vat() {
    let app = TestApp::new().await;
    let system = app.create_supermarket("Corner Market").await;
    // create_product sets cost to half the price.
    let product = app.create_product(system.id, "Coffee 500g", dec!(10.00)).await;
    seed_stock(&app, system.id, product.id, 50).await;

    let result = app
        .services
        .sales
        .create_sale(&app.owner, system.id, one_item_sale(product.id, 3))
        .await
        .expect("sale");

    let item = &result.items[0];
    assert_eq!(item.unit_price, dec!(10.00));
    // Purchase-order creation pushed the PO cost onto the product.
    assert_eq!(item.unit_cost, dec!(1.00));
    assert_eq!(item.total_price, dec!(30.00));

    // Default VAT is 16%.
    assert_eq!(result.sale.vat_amount, dec!(4.80));
    assert_eq!(result.sale.total_price, dec!(34.80));
}

#[tokio::test]
async fn sale_consumes_batches_earliest_expiry_first() {
    let app = TestApp::new().await;
    let system = app.create_supermarket("Corner Market").await;
    let product = app.create_product(system.id, "Yogurt", dec!(1.50)).await;
    let supplier = app.create_supplier(system.id, "Dairy Co").await;
    let po = app
        .create_purchase_order(system.id, supplier.id, product.id, 60, dec!(0.80))
        .await;

    let today = Utc::now().date_naive();
    let near = today + Duration::days(3);
    let far = today + Duration::days(30);

    for (quantity, expiry) in [(20, far), (20, near)] {
        app.services
            .receiving
            .record_receipt(
                &app.owner,
                system.id,
                po.id,
                RecordReceiptInput {
                    received_quantity: quantity,
                    received_date: None,
                    expiry_date: Some(expiry),
                    location: None,
                },
            )
            .await
            .expect("receipt");
    }

    app.services
        .sales
        .create_sale(&app.owner, system.id, one_item_sale(product.id, 25))
        .await
        .expect("sale");

    let batches = product_batch::Entity::find()
        .filter(product_batch::Column::ProductId.eq(product.id))
        .all(app.db.as_ref())
        .await
        .expect("batches");

    let near_batch = batches.iter().find(|b| b.expiry_date == Some(near)).unwrap();
    let far_batch = batches.iter().find(|b| b.expiry_date == Some(far)).unwrap();
    // The near-expiry batch is drained before the far one is touched.
    assert_eq!(near_batch.quantity, 0);
    assert_eq!(far_batch.quantity, 15);
    assert_eq!(app.reload_product(product.id).await.stock_quantity, 15);
}

#[tokio::test]
async fn voiding_an_item_restores_the_consumed_batches() {
    let app = TestApp::new().await;
    let system = app.create_supermarket("Corner Market").await;
    let product = app.create_product(system.id, "Cheese", dec!(6.00)).await;
    seed_stock(&app, system.id, product.id, 40).await;

    let result = app
        .services
        .sales
        .create_sale(&app.owner, system.id, one_item_sale(product.id, 15))
        .await
        .expect("sale");
    assert_eq!(app.reload_product(product.id).await.stock_quantity, 25);

    let after_void = app
        .services
        .sales
        .void_sale_item(&app.owner, system.id, result.sale.id, result.items[0].id)
        .await
        .expect("void item");

    assert_eq!(app.reload_product(product.id).await.stock_quantity, 40);
    assert_eq!(app.batch_stock(product.id).await, 40);
    assert!(after_void.items.is_empty());
    assert_eq!(after_void.sale.total_price, dec!(0.00));
}

#[tokio::test]
async fn voiding_a_sale_restores_every_item() {
    let app = TestApp::new().await;
    let system = app.create_supermarket("Corner Market").await;
    let product_a = app.create_product(system.id, "Bread", dec!(1.20)).await;
    let product_b = app.create_product(system.id, "Jam", dec!(3.40)).await;
    seed_stock(&app, system.id, product_a.id, 30).await;
    seed_stock(&app, system.id, product_b.id, 30).await;

    let result = app
        .services
        .sales
        .create_sale(
            &app.owner,
            system.id,
            CreateSaleInput {
                cashier_employee_id: None,
                payment_type: PaymentType::Card,
                discount_amount: None,
                vat_rate: None,
                items: vec![
                    SaleItemInput {
                        product_id: product_a.id,
                        quantity: 10,
                        unit_price: None,
                        discount_amount: None,
                    },
                    SaleItemInput {
                        product_id: product_b.id,
                        quantity: 5,
                        unit_price: None,
                        discount_amount: None,
                    },
                ],
            },
        )
        .await
        .expect("sale");

    app.services
        .sales
        .void_sale(&app.owner, system.id, result.sale.id)
        .await
        .expect("void sale");

    assert_eq!(app.reload_product(product_a.id).await.stock_quantity, 30);
    assert_eq!(app.reload_product(product_b.id).await.stock_quantity, 30);

    let err = app
        .services
        .sales
        .get_sale(&app.owner, system.id, result.sale.id)
        .await
        .expect_err("voided sale is gone");
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn empty_sales_are_rejected() {
    let app = TestApp::new().await;
    let system = app.create_supermarket("Corner Market").await;

    let err = app
        .services
        .sales
        .create_sale(
            &app.owner,
            system.id,
            CreateSaleInput {
                cashier_employee_id: None,
                payment_type: PaymentType::Cash,
                discount_amount: None,
                vat_rate: None,
                items: vec![],
            },
        )
        .await
        .expect_err("empty sale must fail");
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn aggregate_equals_batch_sum_after_mixed_operations() {
    let app = TestApp::new().await;
    let system = app.create_supermarket("Corner Market").await;
    let product = app.create_product(system.id, "Pasta", dec!(1.80)).await;
    let supplier = app.create_supplier(system.id, "Grain Traders").await;
    let po = app
        .create_purchase_order(system.id, supplier.id, product.id, 200, dec!(1.00))
        .await;

    let today = Utc::now().date_naive();
    for (quantity, days) in [(60, 10), (40, 90)] {
        app.services
            .receiving
            .record_receipt(
                &app.owner,
                system.id,
                po.id,
                RecordReceiptInput {
                    received_quantity: quantity,
                    received_date: None,
                    expiry_date: Some(today + Duration::days(days)),
                    location: None,
                },
            )
            .await
            .expect("receipt");
    }

    let sale = app
        .services
        .sales
        .create_sale(&app.owner, system.id, one_item_sale(product.id, 75))
        .await
        .expect("sale");
    app.services
        .sales
        .void_sale_item(&app.owner, system.id, sale.sale.id, sale.items[0].id)
        .await
        .expect("void");
    app.services
        .sales
        .create_sale(&app.owner, system.id, one_item_sale(product.id, 33))
        .await
        .expect("second sale");

    let product_row = app.reload_product(product.id).await;
    assert_eq!(product_row.stock_quantity, 67);
    assert_eq!(app.batch_stock(product.id).await, 67);
}

#[tokio::test]
async fn receipt_of_sold_stock_cannot_be_deleted() {
    let app = TestApp::new().await;
    let system = app.create_supermarket("Corner Market").await;
    let product = app.create_product(system.id, "Honey", dec!(5.00)).await;
    let supplier = app.create_supplier(system.id, "Apiary").await;
    let po = app
        .create_purchase_order(system.id, supplier.id, product.id, 50, dec!(3.00))
        .await;

    let outcome = app
        .services
        .receiving
        .record_receipt(
            &app.owner,
            system.id,
            po.id,
            RecordReceiptInput {
                received_quantity: 50,
                received_date: None,
                expiry_date: None,
                location: None,
            },
        )
        .await
        .expect("receipt");

    app.services
        .sales
        .create_sale(&app.owner, system.id, one_item_sale(product.id, 30))
        .await
        .expect("sale");

    // The batch only holds 20 of the original 50 now.
    let err = app
        .services
        .receiving
        .delete_receipt(&app.owner, system.id, outcome.receipt.id)
        .await
        .expect_err("deleting a consumed receipt must fail");
    assert!(matches!(err, ServiceError::Conflict(_)));
    assert_eq!(app.reload_product(product.id).await.stock_quantity, 20);
}
