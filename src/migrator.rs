use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_tenancy_tables::Migration),
            Box::new(m20240301_000002_create_order_tables::Migration),
            Box::new(m20240301_000003_create_stock_tables::Migration),
            Box::new(m20240301_000004_create_fulfillment_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_tenancy_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_tenancy_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Tenants::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Tenants::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Tenants::Name).string().not_null())
                        .col(
                            ColumnDef::new(Tenants::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Warehouses::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Warehouses::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Warehouses::TenantId).uuid().not_null())
                        .col(ColumnDef::new(Warehouses::Code).string().not_null())
                        .col(ColumnDef::new(Warehouses::Name).string().not_null())
                        .col(
                            ColumnDef::new(Warehouses::CreatedAt)
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
                        .name("uq_warehouses_tenant_code")
                        .table(Warehouses::Table)
                        .col(Warehouses::TenantId)
                        .col(Warehouses::Code)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::TenantId).uuid().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductVariants::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductVariants::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductVariants::TenantId).uuid().not_null())
                        .col(ColumnDef::new(ProductVariants::ProductId).uuid().not_null())
                        .col(ColumnDef::new(ProductVariants::Sku).string().not_null())
                        .col(
                            ColumnDef::new(ProductVariants::CreatedAt)
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
                        .name("uq_product_variants_tenant_sku")
                        .table(ProductVariants::Table)
                        .col(ProductVariants::TenantId)
                        .col(ProductVariants::Sku)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductVariants::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Warehouses::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Tenants::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Tenants {
        Table,
        Id,
        Name,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Warehouses {
        Table,
        Id,
        TenantId,
        Code,
        Name,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        TenantId,
        Name,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum ProductVariants {
        Table,
        Id,
        TenantId,
        ProductId,
        Sku,
        CreatedAt,
    }
}

mod m20240301_000002_create_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::TenantId).uuid().not_null())
                        .col(ColumnDef::new(Orders::OrderNumber).string().not_null())
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
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
                        .name("idx_orders_tenant")
                        .table(Orders::Table)
                        .col(Orders::TenantId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderLines::TenantId).uuid().not_null())
                        .col(ColumnDef::new(OrderLines::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderLines::VariantId).uuid().not_null())
                        .col(ColumnDef::new(OrderLines::Qty).big_integer().not_null())
                        .col(
                            ColumnDef::new(OrderLines::CreatedAt)
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
                        .name("idx_order_lines_tenant_order")
                        .table(OrderLines::Table)
                        .col(OrderLines::TenantId)
                        .col(OrderLines::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        TenantId,
        OrderNumber,
        Status,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderLines {
        Table,
        Id,
        TenantId,
        OrderId,
        VariantId,
        Qty,
        CreatedAt,
    }
}

mod m20240301_000003_create_stock_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_stock_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockLedgerEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockLedgerEntries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLedgerEntries::TenantId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLedgerEntries::WarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLedgerEntries::VariantId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLedgerEntries::QtyDelta)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockLedgerEntries::Kind).string().not_null())
                        .col(ColumnDef::new(StockLedgerEntries::Reason).string().null())
                        .col(
                            ColumnDef::new(StockLedgerEntries::CorrelationId)
                                .uuid()
                                .null(),
                        )
                        .col(ColumnDef::new(StockLedgerEntries::RefType).string().null())
                        .col(ColumnDef::new(StockLedgerEntries::RefId).uuid().null())
                        .col(
                            ColumnDef::new(StockLedgerEntries::CreatedAt)
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
                        .name("idx_stock_ledger_tenant_warehouse_variant")
                        .table(StockLedgerEntries::Table)
                        .col(StockLedgerEntries::TenantId)
                        .col(StockLedgerEntries::WarehouseId)
                        .col(StockLedgerEntries::VariantId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockSnapshots::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockSnapshots::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockSnapshots::TenantId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockSnapshots::WarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockSnapshots::VariantId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockSnapshots::OnHand)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockSnapshots::Reserved)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockSnapshots::Available)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockSnapshots::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One row per (tenant, warehouse, variant); the row every
            // concurrent mutation serializes on.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_stock_snapshots_tenant_warehouse_variant")
                        .table(StockSnapshots::Table)
                        .col(StockSnapshots::TenantId)
                        .col(StockSnapshots::WarehouseId)
                        .col(StockSnapshots::VariantId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Reservations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Reservations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Reservations::TenantId).uuid().not_null())
                        .col(ColumnDef::new(Reservations::OrderLineId).uuid().not_null())
                        .col(ColumnDef::new(Reservations::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(Reservations::VariantId).uuid().not_null())
                        .col(ColumnDef::new(Reservations::Qty).big_integer().not_null())
                        .col(ColumnDef::new(Reservations::Status).string().not_null())
                        .col(ColumnDef::new(Reservations::DedupeKey).string().null())
                        .col(ColumnDef::new(Reservations::ShipmentId).uuid().null())
                        .col(
                            ColumnDef::new(Reservations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Reservations::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            // NULL keys never collide, so only deduped creates pay the
            // uniqueness cost.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_reservations_tenant_dedupe_key")
                        .table(Reservations::Table)
                        .col(Reservations::TenantId)
                        .col(Reservations::DedupeKey)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_reservations_tenant_line_warehouse_variant_status")
                        .table(Reservations::Table)
                        .col(Reservations::TenantId)
                        .col(Reservations::OrderLineId)
                        .col(Reservations::WarehouseId)
                        .col(Reservations::VariantId)
                        .col(Reservations::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_reservations_tenant_shipment")
                        .table(Reservations::Table)
                        .col(Reservations::TenantId)
                        .col(Reservations::ShipmentId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Reservations::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockSnapshots::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockLedgerEntries::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockLedgerEntries {
        Table,
        Id,
        TenantId,
        WarehouseId,
        VariantId,
        QtyDelta,
        Kind,
        Reason,
        CorrelationId,
        RefType,
        RefId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum StockSnapshots {
        Table,
        Id,
        TenantId,
        WarehouseId,
        VariantId,
        OnHand,
        Reserved,
        Available,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Reservations {
        Table,
        Id,
        TenantId,
        OrderLineId,
        WarehouseId,
        VariantId,
        Qty,
        Status,
        DedupeKey,
        ShipmentId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000004_create_fulfillment_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_fulfillment_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Shipments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Shipments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Shipments::TenantId).uuid().not_null())
                        .col(ColumnDef::new(Shipments::OrderId).uuid().not_null())
                        .col(ColumnDef::new(Shipments::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(Shipments::Status).string().not_null())
                        .col(
                            ColumnDef::new(Shipments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Shipments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipments_tenant_order")
                        .table(Shipments::Table)
                        .col(Shipments::TenantId)
                        .col(Shipments::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ShipmentLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShipmentLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShipmentLines::TenantId).uuid().not_null())
                        .col(ColumnDef::new(ShipmentLines::ShipmentId).uuid().not_null())
                        .col(ColumnDef::new(ShipmentLines::OrderLineId).uuid().not_null())
                        .col(ColumnDef::new(ShipmentLines::VariantId).uuid().not_null())
                        .col(ColumnDef::new(ShipmentLines::Qty).big_integer().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shipment_lines_tenant_shipment")
                        .table(ShipmentLines::Table)
                        .col(ShipmentLines::TenantId)
                        .col(ShipmentLines::ShipmentId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ReturnReceipts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReturnReceipts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReturnReceipts::TenantId).uuid().not_null())
                        .col(ColumnDef::new(ReturnReceipts::OrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(ReturnReceipts::WarehouseId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReturnReceipts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ReturnLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReturnLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReturnLines::TenantId).uuid().not_null())
                        .col(ColumnDef::new(ReturnLines::ReturnId).uuid().not_null())
                        .col(ColumnDef::new(ReturnLines::OrderLineId).uuid().not_null())
                        .col(ColumnDef::new(ReturnLines::VariantId).uuid().not_null())
                        .col(ColumnDef::new(ReturnLines::Qty).big_integer().not_null())
                        .col(ColumnDef::new(ReturnLines::Reason).string().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_return_lines_tenant_return")
                        .table(ReturnLines::Table)
                        .col(ReturnLines::TenantId)
                        .col(ReturnLines::ReturnId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReturnLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ReturnReceipts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ShipmentLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Shipments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Shipments {
        Table,
        Id,
        TenantId,
        OrderId,
        WarehouseId,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum ShipmentLines {
        Table,
        Id,
        TenantId,
        ShipmentId,
        OrderLineId,
        VariantId,
        Qty,
    }

    #[derive(DeriveIden)]
    enum ReturnReceipts {
        Table,
        Id,
        TenantId,
        OrderId,
        WarehouseId,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum ReturnLines {
        Table,
        Id,
        TenantId,
        ReturnId,
        OrderLineId,
        VariantId,
        Qty,
        Reason,
    }
}
