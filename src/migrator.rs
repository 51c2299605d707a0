use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250201_000001_create_systems_table::Migration),
            Box::new(m20250201_000002_create_employees_table::Migration),
            Box::new(m20250201_000003_create_suppliers_table::Migration),
            Box::new(m20250201_000004_create_products_table::Migration),
            Box::new(m20250201_000005_create_purchase_orders_table::Migration),
            Box::new(m20250201_000006_create_goods_receipts_table::Migration),
            Box::new(m20250201_000007_create_product_batches_table::Migration),
            Box::new(m20250201_000008_create_sales_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20250201_000001_create_systems_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250201_000001_create_systems_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Systems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Systems::Id)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Systems::Uuid).uuid().not_null().unique_key())
                        .col(ColumnDef::new(Systems::Name).string().not_null())
                        .col(ColumnDef::new(Systems::OwnerId).uuid().not_null())
                        .col(ColumnDef::new(Systems::Category).string_len(20).not_null())
                        .col(ColumnDef::new(Systems::Description).text().not_null())
                        .col(
                            ColumnDef::new(Systems::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Systems::IsPublic)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Systems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Systems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_systems_owner_id")
                        .table(Systems::Table)
                        .col(Systems::OwnerId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Systems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Systems {
        Table,
        Id,
        Uuid,
        Name,
        OwnerId,
        Category,
        Description,
        IsActive,
        IsPublic,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250201_000002_create_employees_table {
    use sea_orm_migration::prelude::*;

    use super::m20250201_000001_create_systems_table::Systems;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250201_000002_create_employees_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Employees::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Employees::Id)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Employees::UserId).uuid().not_null())
                        .col(ColumnDef::new(Employees::SystemId).big_integer().not_null())
                        .col(ColumnDef::new(Employees::Name).string().not_null())
                        .col(ColumnDef::new(Employees::Role).string_len(40).not_null())
                        .col(ColumnDef::new(Employees::Phone).string().null())
                        .col(
                            ColumnDef::new(Employees::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Employees::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Employees::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_employees_system_id")
                                .from(Employees::Table, Employees::SystemId)
                                .to(Systems::Table, Systems::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // One employee identity per system per login account
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_employees_user_system")
                        .table(Employees::Table)
                        .col(Employees::UserId)
                        .col(Employees::SystemId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Employees::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Employees {
        Table,
        Id,
        UserId,
        SystemId,
        Name,
        Role,
        Phone,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250201_000003_create_suppliers_table {
    use sea_orm_migration::prelude::*;

    use super::m20250201_000001_create_systems_table::Systems;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250201_000003_create_suppliers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Suppliers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Suppliers::Id)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Suppliers::SystemId).big_integer().not_null())
                        .col(ColumnDef::new(Suppliers::Name).string().not_null())
                        .col(ColumnDef::new(Suppliers::Phone).string().not_null())
                        .col(ColumnDef::new(Suppliers::Email).string().null())
                        .col(
                            ColumnDef::new(Suppliers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Suppliers::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_suppliers_system_id")
                                .from(Suppliers::Table, Suppliers::SystemId)
                                .to(Systems::Table, Systems::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_suppliers_system_name")
                        .table(Suppliers::Table)
                        .col(Suppliers::SystemId)
                        .col(Suppliers::Name)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Suppliers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Suppliers {
        Table,
        Id,
        SystemId,
        Name,
        Phone,
        Email,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250201_000004_create_products_table {
    use sea_orm_migration::prelude::*;

    use super::m20250201_000001_create_systems_table::Systems;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250201_000004_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Products::Id)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Products::SystemId).big_integer().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(
                            ColumnDef::new(Products::Barcode)
                                .string_len(13)
                                .null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Products::Price)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::Cost)
                                .decimal_len(10, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::StockQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::MinimumStock)
                                .integer()
                                .not_null()
                                .default(10),
                        )
                        .col(ColumnDef::new(Products::ExpiryDate).date().null())
                        .col(ColumnDef::new(Products::Category).string().not_null())
                        .col(
                            ColumnDef::new(Products::DiscountPercentage)
                                .decimal_len(5, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_products_system_id")
                                .from(Products::Table, Products::SystemId)
                                .to(Systems::Table, Systems::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_system_id")
                        .table(Products::Table)
                        .col(Products::SystemId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Products {
        Table,
        Id,
        SystemId,
        Name,
        Barcode,
        Price,
        Cost,
        StockQuantity,
        MinimumStock,
        ExpiryDate,
        Category,
        DiscountPercentage,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250201_000005_create_purchase_orders_table {
    use sea_orm_migration::prelude::*;

    use super::m20250201_000001_create_systems_table::Systems;
    use super::m20250201_000003_create_suppliers_table::Suppliers;
    use super::m20250201_000004_create_products_table::Products;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250201_000005_create_purchase_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrders::Id)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::SystemId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::SupplierId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::ProductId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(PurchaseOrders::Cost)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::OrderDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::ExpectedDeliveryDate)
                                .date()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::Status)
                                .string_len(20)
                                .not_null()
                                .default("pending"),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_orders_system_id")
                                .from(PurchaseOrders::Table, PurchaseOrders::SystemId)
                                .to(Systems::Table, Systems::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_orders_supplier_id")
                                .from(PurchaseOrders::Table, PurchaseOrders::SupplierId)
                                .to(Suppliers::Table, Suppliers::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_purchase_orders_product_id")
                                .from(PurchaseOrders::Table, PurchaseOrders::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_purchase_orders_system_status")
                        .table(PurchaseOrders::Table)
                        .col(PurchaseOrders::SystemId)
                        .col(PurchaseOrders::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum PurchaseOrders {
        Table,
        Id,
        SystemId,
        SupplierId,
        ProductId,
        Quantity,
        Cost,
        OrderDate,
        ExpectedDeliveryDate,
        Status,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250201_000006_create_goods_receipts_table {
    use sea_orm_migration::prelude::*;

    use super::m20250201_000005_create_purchase_orders_table::PurchaseOrders;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250201_000006_create_goods_receipts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(GoodsReceipts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(GoodsReceipts::Id)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceipts::PurchaseOrderId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceipts::ReceivedQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceipts::ReceivedDate)
                                .date()
                                .not_null(),
                        )
                        .col(ColumnDef::new(GoodsReceipts::ExpiryDate).date().null())
                        .col(
                            ColumnDef::new(GoodsReceipts::Location)
                                .string()
                                .not_null()
                                .default("Main Warehouse"),
                        )
                        .col(
                            ColumnDef::new(GoodsReceipts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(GoodsReceipts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_goods_receipts_purchase_order_id")
                                .from(GoodsReceipts::Table, GoodsReceipts::PurchaseOrderId)
                                .to(PurchaseOrders::Table, PurchaseOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_goods_receipts_purchase_order_id")
                        .table(GoodsReceipts::Table)
                        .col(GoodsReceipts::PurchaseOrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(GoodsReceipts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum GoodsReceipts {
        Table,
        Id,
        PurchaseOrderId,
        ReceivedQuantity,
        ReceivedDate,
        ExpiryDate,
        Location,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250201_000007_create_product_batches_table {
    use sea_orm_migration::prelude::*;

    use super::m20250201_000004_create_products_table::Products;
    use super::m20250201_000005_create_purchase_orders_table::PurchaseOrders;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250201_000007_create_product_batches_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ProductBatches::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductBatches::Id)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductBatches::ProductId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductBatches::PurchaseOrderId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductBatches::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(ProductBatches::ExpiryDate).date().null())
                        .col(
                            ColumnDef::new(ProductBatches::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductBatches::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_batches_product_id")
                                .from(ProductBatches::Table, ProductBatches::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_batches_purchase_order_id")
                                .from(ProductBatches::Table, ProductBatches::PurchaseOrderId)
                                .to(PurchaseOrders::Table, PurchaseOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_product_batches_product_po")
                        .table(ProductBatches::Table)
                        .col(ProductBatches::ProductId)
                        .col(ProductBatches::PurchaseOrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductBatches::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum ProductBatches {
        Table,
        Id,
        ProductId,
        PurchaseOrderId,
        Quantity,
        ExpiryDate,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250201_000008_create_sales_tables {
    use sea_orm_migration::prelude::*;

    use super::m20250201_000001_create_systems_table::Systems;
    use super::m20250201_000002_create_employees_table::Employees;
    use super::m20250201_000004_create_products_table::Products;
    use super::m20250201_000007_create_product_batches_table::ProductBatches;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250201_000008_create_sales_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sales::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Sales::Id)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Sales::SystemId).big_integer().not_null())
                        .col(ColumnDef::new(Sales::CashierEmployeeId).big_integer().null())
                        .col(
                            ColumnDef::new(Sales::ReceiptNumber)
                                .string_len(50)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Sales::PaymentType).string_len(10).not_null())
                        .col(
                            ColumnDef::new(Sales::DiscountAmount)
                                .decimal_len(10, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Sales::VatRate)
                                .decimal_len(5, 2)
                                .not_null()
                                .default(0.16),
                        )
                        .col(
                            ColumnDef::new(Sales::VatAmount)
                                .decimal_len(10, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Sales::TotalPrice)
                                .decimal_len(10, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Sales::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sales_system_id")
                                .from(Sales::Table, Sales::SystemId)
                                .to(Systems::Table, Systems::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sales_cashier_employee_id")
                                .from(Sales::Table, Sales::CashierEmployeeId)
                                .to(Employees::Table, Employees::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SaleItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SaleItems::Id)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SaleItems::SaleId).big_integer().not_null())
                        .col(ColumnDef::new(SaleItems::ProductId).big_integer().not_null())
                        .col(ColumnDef::new(SaleItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(SaleItems::UnitPrice)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SaleItems::UnitCost)
                                .decimal_len(10, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SaleItems::DiscountAmount)
                                .decimal_len(10, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SaleItems::TotalPrice)
                                .decimal_len(10, 2)
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sale_items_sale_id")
                                .from(SaleItems::Table, SaleItems::SaleId)
                                .to(Sales::Table, Sales::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sale_items_product_id")
                                .from(SaleItems::Table, SaleItems::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SaleAllocations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SaleAllocations::Id)
                                .big_integer()
                                .auto_increment()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SaleAllocations::SaleItemId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SaleAllocations::BatchId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SaleAllocations::Quantity).integer().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sale_allocations_sale_item_id")
                                .from(SaleAllocations::Table, SaleAllocations::SaleItemId)
                                .to(SaleItems::Table, SaleItems::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sale_allocations_batch_id")
                                .from(SaleAllocations::Table, SaleAllocations::BatchId)
                                .to(ProductBatches::Table, ProductBatches::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sale_items_sale_id")
                        .table(SaleItems::Table)
                        .col(SaleItems::SaleId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sale_allocations_sale_item_id")
                        .table(SaleAllocations::Table)
                        .col(SaleAllocations::SaleItemId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SaleAllocations::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SaleItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Sales::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Sales {
        Table,
        Id,
        SystemId,
        CashierEmployeeId,
        ReceiptNumber,
        PaymentType,
        DiscountAmount,
        VatRate,
        VatAmount,
        TotalPrice,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub enum SaleItems {
        Table,
        Id,
        SaleId,
        ProductId,
        Quantity,
        UnitPrice,
        UnitCost,
        DiscountAmount,
        TotalPrice,
    }

    #[derive(DeriveIden)]
    pub enum SaleAllocations {
        Table,
        Id,
        SaleItemId,
        BatchId,
        Quantity,
    }
}
