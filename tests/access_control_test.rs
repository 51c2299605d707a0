mod common;

use rust_decimal_macros::dec;
use uuid::Uuid;

use storefront_api::{
    access::Principal,
    entities::employee::EmployeeRole,
    errors::ServiceError,
    services::{
        employees::{AddEmployeeInput, UpdateEmployeeInput},
        procurement::CreatePurchaseOrderInput,
        receiving::RecordReceiptInput,
    },
};

use common::TestApp;

async fn hire(
    app: &TestApp,
    system_id: i64,
    role: EmployeeRole,
) -> (Principal, i64) {
    let user_id = Uuid::new_v4();
    let employee = app
        .services
        .employees
        .add_employee(
            &app.owner,
            system_id,
            AddEmployeeInput {
                user_id,
                name: "Test Employee".into(),
                role,
                phone: None,
            },
        )
        .await
        .expect("failed to hire employee");
    (Principal::new(user_id), employee.id)
}

#[tokio::test]
async fn waiter_cannot_create_purchase_orders() {
    let app = TestApp::new().await;
    let system = app.create_restaurant("Trattoria").await;
    let product = app.create_product(system.id, "Tomatoes", dec!(0.80)).await;
    let supplier = app.create_supplier(system.id, "Greengrocer").await;
    let (waiter, _) = hire(&app, system.id, EmployeeRole::Waiter).await;

    let err = app
        .services
        .purchase_orders
        .create_purchase_order(
            &waiter,
            system.id,
            CreatePurchaseOrderInput {
                supplier_id: supplier.id,
                product_id: product.id,
                quantity: 10,
                cost: dec!(0.50),
                expected_delivery_date: None,
            },
        )
        .await
        .expect_err("waiter must be denied");
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn inventory_manager_can_order_and_receive() {
    let app = TestApp::new().await;
    let system = app.create_restaurant("Trattoria").await;
    let product = app.create_product(system.id, "Flour", dec!(1.10)).await;
    let supplier = app.create_supplier(system.id, "Grain Traders").await;
    let (manager, _) = hire(&app, system.id, EmployeeRole::InventoryManager).await;

    let po = app
        .services
        .purchase_orders
        .create_purchase_order(
            &manager,
            system.id,
            CreatePurchaseOrderInput {
                supplier_id: supplier.id,
                product_id: product.id,
                quantity: 25,
                cost: dec!(0.70),
                expected_delivery_date: None,
            },
        )
        .await
        .expect("inventory manager may order");

    let outcome = app
        .services
        .receiving
        .record_receipt(
            &manager,
            system.id,
            po.id,
            RecordReceiptInput {
                received_quantity: 25,
                received_date: None,
                expiry_date: None,
                location: None,
            },
        )
        .await
        .expect("inventory manager may receive");
    assert_eq!(outcome.product.stock_quantity, 25);
}

#[tokio::test]
async fn owner_bypasses_role_checks() {
    let app = TestApp::new().await;
    let system = app.create_supermarket("Corner Market").await;

    // The owner has no employee record yet is authorized for everything.
    let products = app
        .services
        .products
        .low_stock(&app.owner, system.id)
        .await
        .expect("owner may view inventory reports");
    assert!(products.is_empty());
}

#[tokio::test]
async fn strangers_are_denied_and_cross_tenant_rows_are_invisible() {
    let app = TestApp::new().await;
    let system_a = app.create_supermarket("Market A").await;
    let system_b = app.create_supermarket("Market B").await;
    let product_b = app.create_product(system_b.id, "Salt", dec!(0.40)).await;

    // A stranger gets a denial at the system gate.
    let stranger = Principal::new(Uuid::new_v4());
    let err = app
        .services
        .products
        .list_products(&stranger, system_a.id, None)
        .await
        .expect_err("stranger must be denied");
    assert!(matches!(err, ServiceError::Forbidden(_)));

    // A product of tenant B does not resolve under tenant A, even for the
    // owner of both.
    let err = app
        .services
        .products
        .get_product(&app.owner, system_a.id, product_b.id)
        .await
        .expect_err("cross-tenant row must be invisible");
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn missing_system_is_not_found() {
    let app = TestApp::new().await;
    let err = app
        .services
        .products
        .list_products(&app.owner, 9999, None)
        .await
        .expect_err("missing system");
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn deactivated_employees_lose_access() {
    let app = TestApp::new().await;
    let system = app.create_supermarket("Corner Market").await;
    let (cashier, employee_id) = hire(&app, system.id, EmployeeRole::CashierSupermarket).await;

    // Active: may list the catalog.
    app.services
        .products
        .list_products(&cashier, system.id, None)
        .await
        .expect("active employee may read");

    app.services
        .employees
        .deactivate_employee(&app.owner, system.id, employee_id)
        .await
        .expect("deactivate");

    let err = app
        .services
        .products
        .list_products(&cashier, system.id, None)
        .await
        .expect_err("deactivated employee must be denied");
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn one_employee_identity_per_system_per_account() {
    let app = TestApp::new().await;
    let system = app.create_supermarket("Corner Market").await;
    let user_id = Uuid::new_v4();

    for role in [
        EmployeeRole::CashierSupermarket,
        EmployeeRole::ManagerSupermarket,
    ] {
        let result = app
            .services
            .employees
            .add_employee(
                &app.owner,
                system.id,
                AddEmployeeInput {
                    user_id,
                    name: "Dupe".into(),
                    role,
                    phone: None,
                },
            )
            .await;
        match role {
            EmployeeRole::CashierSupermarket => {
                result.expect("first profile");
            }
            _ => {
                let err = result.expect_err("second profile must fail");
                assert!(matches!(err, ServiceError::Conflict(_)));
            }
        }
    }
}

#[tokio::test]
async fn roles_must_match_the_system_category() {
    let app = TestApp::new().await;
    let system = app.create_restaurant("Trattoria").await;

    let err = app
        .services
        .employees
        .add_employee(
            &app.owner,
            system.id,
            AddEmployeeInput {
                user_id: Uuid::new_v4(),
                name: "Misfit".into(),
                role: EmployeeRole::CashierSupermarket,
                phone: None,
            },
        )
        .await
        .expect_err("supermarket role in a restaurant must fail");
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn role_changes_take_effect() {
    let app = TestApp::new().await;
    let system = app.create_restaurant("Trattoria").await;
    let product = app.create_product(system.id, "Basil", dec!(0.90)).await;
    let supplier = app.create_supplier(system.id, "Greengrocer").await;
    let (worker, employee_id) = hire(&app, system.id, EmployeeRole::Waiter).await;

    let order = CreatePurchaseOrderInput {
        supplier_id: supplier.id,
        product_id: product.id,
        quantity: 5,
        cost: dec!(0.40),
        expected_delivery_date: None,
    };

    let err = app
        .services
        .purchase_orders
        .create_purchase_order(&worker, system.id, order.clone())
        .await
        .expect_err("waiter denied");
    assert!(matches!(err, ServiceError::Forbidden(_)));

    app.services
        .employees
        .update_employee(
            &app.owner,
            system.id,
            employee_id,
            UpdateEmployeeInput {
                role: Some(EmployeeRole::InventoryManager),
                ..Default::default()
            },
        )
        .await
        .expect("promote");

    app.services
        .purchase_orders
        .create_purchase_order(&worker, system.id, order)
        .await
        .expect("inventory manager allowed");
}
