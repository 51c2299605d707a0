use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Catalog product belonging to one system.
///
/// `stock_quantity` and `expiry_date` are derived fields: after any batch
/// mutation they are recomputed from the batch set, never edited directly.
/// `stock_quantity` equals the sum of positive batch quantities and
/// `expiry_date` the earliest expiry among batches with stock.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub system_id: i64,
    pub name: String,
    /// Generated 13-digit code, globally unique, never user-supplied.
    #[sea_orm(unique)]
    pub barcode: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub cost: Decimal,
    pub stock_quantity: i32,
    pub minimum_stock: i32,
    pub expiry_date: Option<NaiveDate>,
    pub category: String,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub discount_percentage: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::system::Entity",
        from = "Column::SystemId",
        to = "super::system::Column::Id"
    )]
    System,
    #[sea_orm(has_many = "super::product_batch::Entity")]
    Batches,
    #[sea_orm(has_many = "super::purchase_order::Entity")]
    PurchaseOrders,
    #[sea_orm(has_many = "super::sale_item::Entity")]
    SaleItems,
}

impl Related<super::system::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::System.def()
    }
}

impl Related<super::product_batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Batches.def()
    }
}

impl Related<super::purchase_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PurchaseOrders.def()
    }
}

impl Related<super::sale_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SaleItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Curated default categories; custom non-empty categories are also accepted.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "fruits_vegetables",
    "meat_seafood",
    "dairy_eggs",
    "bakery_bread",
    "pantry",
    "snacks_sweets",
    "beverages",
    "frozen_foods",
    "personal_care",
    "cleaning_household",
    "baby_products",
    "pet_supplies",
];
