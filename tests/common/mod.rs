#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

use storefront_api::{
    access::Principal,
    config::AppConfig,
    db,
    entities::{product, purchase_order, supplier, system, system::SystemCategory},
    events::{self, EventSender},
    handlers::AppServices,
    services::{
        procurement::CreatePurchaseOrderInput, products::CreateProductInput,
        suppliers::CreateSupplierInput, systems::CreateSystemInput,
    },
};

/// Helper harness backed by a file-based SQLite database in a temp
/// directory. A single pooled connection keeps transactions serialized the
/// same way a row-locked Postgres would.
pub struct TestApp {
    pub services: AppServices,
    pub db: Arc<DatabaseConnection>,
    /// A principal that owns whatever systems the helpers create.
    pub owner: Principal,
    _event_task: tokio::task::JoinHandle<()>,
    _tmp: TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let tmp = TempDir::new().expect("failed to create temp dir");
        let db_file = tmp.path().join("storefront_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_file.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db = Arc::new(pool);
        let (tx, rx) = mpsc::channel(256);
        let event_sender = EventSender::new(tx);
        let event_task = tokio::spawn(events::process_events(rx));

        let services = AppServices::new(db.clone(), event_sender, &cfg);

        Self {
            services,
            db,
            owner: Principal::new(Uuid::new_v4()),
            _event_task: event_task,
            _tmp: tmp,
        }
    }

    /// Creates a supermarket tenant owned by `self.owner`.
    pub async fn create_supermarket(&self, name: &str) -> system::Model {
        self.services
            .systems
            .create_system(
                &self.owner,
                CreateSystemInput {
                    name: name.to_string(),
                    category: SystemCategory::Supermarket,
                    description: None,
                    is_public: false,
                },
            )
            .await
            .expect("failed to create supermarket")
    }

    /// Creates a restaurant tenant owned by `self.owner`.
    pub async fn create_restaurant(&self, name: &str) -> system::Model {
        self.services
            .systems
            .create_system(
                &self.owner,
                CreateSystemInput {
                    name: name.to_string(),
                    category: SystemCategory::Restaurant,
                    description: None,
                    is_public: false,
                },
            )
            .await
            .expect("failed to create restaurant")
    }

    /// Creates a product with the given price and a cost of half the price.
    pub async fn create_product(
        &self,
        system_id: i64,
        name: &str,
        price: Decimal,
    ) -> product::Model {
        self.services
            .products
            .create_product(
                &self.owner,
                system_id,
                CreateProductInput {
                    name: name.to_string(),
                    price,
                    cost: Some(price / Decimal::from(2)),
                    minimum_stock: None,
                    category: None,
                    discount_percentage: None,
                },
            )
            .await
            .expect("failed to create product")
    }

    pub async fn create_supplier(&self, system_id: i64, name: &str) -> supplier::Model {
        self.services
            .suppliers
            .create_supplier(
                &self.owner,
                system_id,
                CreateSupplierInput {
                    name: name.to_string(),
                    phone: "+254712345678".to_string(),
                    email: None,
                },
            )
            .await
            .expect("failed to create supplier")
    }

    pub async fn create_purchase_order(
        &self,
        system_id: i64,
        supplier_id: i64,
        product_id: i64,
        quantity: i32,
        cost: Decimal,
    ) -> purchase_order::Model {
        self.services
            .purchase_orders
            .create_purchase_order(
                &self.owner,
                system_id,
                CreatePurchaseOrderInput {
                    supplier_id,
                    product_id,
                    quantity,
                    cost,
                    expected_delivery_date: None,
                },
            )
            .await
            .expect("failed to create purchase order")
    }

    /// Re-reads a product row.
    pub async fn reload_product(&self, product_id: i64) -> product::Model {
        use sea_orm::EntityTrait;
        product::Entity::find_by_id(product_id)
            .one(self.db.as_ref())
            .await
            .expect("query failed")
            .expect("product missing")
    }

    /// Sum of positive batch quantities for a product.
    pub async fn batch_stock(&self, product_id: i64) -> i32 {
        use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
        use storefront_api::entities::product_batch;

        product_batch::Entity::find()
            .filter(product_batch::Column::ProductId.eq(product_id))
            .all(self.db.as_ref())
            .await
            .expect("query failed")
            .iter()
            .filter(|b| b.quantity > 0)
            .map(|b| b.quantity)
            .sum()
    }

    /// Re-reads a purchase order row.
    pub async fn reload_purchase_order(&self, po_id: i64) -> purchase_order::Model {
        use sea_orm::EntityTrait;
        purchase_order::Entity::find_by_id(po_id)
            .one(self.db.as_ref())
            .await
            .expect("query failed")
            .expect("purchase order missing")
    }
}
