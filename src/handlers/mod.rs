pub mod common;
pub mod employees;
pub mod products;
pub mod purchase_orders;
pub mod sales;
pub mod suppliers;
pub mod systems;

use rust_decimal::Decimal;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub systems: Arc<crate::services::systems::SystemService>,
    pub employees: Arc<crate::services::employees::EmployeeService>,
    pub products: Arc<crate::services::products::ProductService>,
    pub suppliers: Arc<crate::services::suppliers::SupplierService>,
    pub purchase_orders: Arc<crate::services::procurement::PurchaseOrderService>,
    pub receiving: Arc<crate::services::receiving::ReceivingService>,
    pub sales: Arc<crate::services::sales::SaleService>,
}

impl AppServices {
    /// Build the services container shared by all HTTP handlers.
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender, config: &AppConfig) -> Self {
        let default_vat_rate = Decimal::try_from(config.default_vat_rate)
            .unwrap_or_else(|_| Decimal::new(16, 2))
            .round_dp(2);

        Self {
            systems: Arc::new(crate::services::systems::SystemService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            employees: Arc::new(crate::services::employees::EmployeeService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            products: Arc::new(crate::services::products::ProductService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            suppliers: Arc::new(crate::services::suppliers::SupplierService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            purchase_orders: Arc::new(crate::services::procurement::PurchaseOrderService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            receiving: Arc::new(crate::services::receiving::ReceivingService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            sales: Arc::new(crate::services::sales::SaleService::new(
                db_pool,
                event_sender,
                default_vat_rate,
            )),
        }
    }
}
