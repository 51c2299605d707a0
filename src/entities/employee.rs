use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A principal scoped to exactly one system. The `(user_id, system_id)` pair
/// is unique: one employee identity per system per login account.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "employees")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: Uuid,
    pub system_id: i64,
    pub name: String,
    pub role: EmployeeRole,
    pub phone: Option<String>,
    pub is_active: bool,
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
    #[sea_orm(has_many = "super::sale::Entity")]
    Sales,
}

impl Related<super::system::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::System.def()
    }
}

impl Related<super::sale::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sales.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Closed role enumeration. Restaurant tenants use the first family,
/// supermarket tenants the `_supermarket` family.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(40))")]
#[serde(rename_all = "snake_case")]
pub enum EmployeeRole {
    #[sea_orm(string_value = "waiter")]
    Waiter,
    #[sea_orm(string_value = "chef")]
    Chef,
    #[sea_orm(string_value = "delivery")]
    Delivery,
    #[sea_orm(string_value = "manager")]
    Manager,
    #[sea_orm(string_value = "head_chef")]
    HeadChef,
    #[sea_orm(string_value = "cashier")]
    Cashier,
    #[sea_orm(string_value = "inventory_manager")]
    InventoryManager,
    #[sea_orm(string_value = "cashier_supermarket")]
    CashierSupermarket,
    #[sea_orm(string_value = "manager_supermarket")]
    ManagerSupermarket,
    #[sea_orm(string_value = "inventory_manager_supermarket")]
    InventoryManagerSupermarket,
}
