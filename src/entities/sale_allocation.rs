use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Records which batch a sale item consumed stock from (first expired, first
/// out). Voiding the item walks its allocations to restore exactly the
/// batches it drew down.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sale_allocations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub sale_item_id: i64,
    pub batch_id: i64,
    pub quantity: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sale_item::Entity",
        from = "Column::SaleItemId",
        to = "super::sale_item::Column::Id"
    )]
    SaleItem,
    #[sea_orm(
        belongs_to = "super::product_batch::Entity",
        from = "Column::BatchId",
        to = "super::product_batch::Column::Id"
    )]
    Batch,
}

impl Related<super::sale_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SaleItem.def()
    }
}

impl Related<super::product_batch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Batch.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
