//! SeaORM entities for the tenant, catalog, procurement, and sales tables.

pub mod employee;
pub mod goods_receipt;
pub mod product;
pub mod product_batch;
pub mod purchase_order;
pub mod sale;
pub mod sale_allocation;
pub mod sale_item;
pub mod supplier;
pub mod system;
