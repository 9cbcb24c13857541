use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_items_table::Migration),
            Box::new(m20240101_000002_create_locations_table::Migration),
            Box::new(m20240101_000003_create_inventory_transactions_table::Migration),
        ]
    }
}

#[derive(DeriveIden)]
enum Items {
    Table,
    Id,
    Name,
    Category,
    Unit,
    Specification,
    DefaultLocationId,
    LowStockThreshold,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Locations {
    Table,
    Id,
    Code,
    Name,
    ParentId,
    IsActive,
    CreatedAt,
}

#[derive(DeriveIden)]
enum InventoryTransactions {
    Table,
    Id,
    ItemId,
    LocationId,
    Type,
    Quantity,
    Date,
    Operator,
    Supplier,
    Recipient,
    Purpose,
    Notes,
    BatchId,
    CreatedAt,
}

mod m20240101_000001_create_items_table {
    use super::Items;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Items::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Items::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Items::Name).string_len(100).not_null())
                        .col(ColumnDef::new(Items::Category).string_len(50).not_null())
                        .col(ColumnDef::new(Items::Unit).string_len(20).not_null())
                        .col(ColumnDef::new(Items::Specification).string().null())
                        .col(ColumnDef::new(Items::DefaultLocationId).uuid().null())
                        .col(
                            ColumnDef::new(Items::LowStockThreshold)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Items::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Items::UpdatedAt)
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
                        .name("idx_items_category")
                        .table(Items::Table)
                        .col(Items::Category)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Items::Table).to_owned())
                .await
        }
    }
}

mod m20240101_000002_create_locations_table {
    use super::Locations;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_locations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Locations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Locations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Locations::Code)
                                .string_len(20)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Locations::Name).string_len(100).not_null())
                        .col(ColumnDef::new(Locations::ParentId).uuid().null())
                        .col(
                            ColumnDef::new(Locations::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Locations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Locations::Table).to_owned())
                .await
        }
    }
}

mod m20240101_000003_create_inventory_transactions_table {
    use super::{InventoryTransactions, Items, Locations};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_inventory_transactions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryTransactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::ItemId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::LocationId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::Type)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::Date)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::Operator)
                                .string_len(50)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::Supplier)
                                .string_len(100)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::Recipient)
                                .string_len(50)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::Purpose)
                                .string_len(200)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InventoryTransactions::Notes)
                                .text()
                                .not_null()
                                .default(""),
                        )
                        .col(ColumnDef::new(InventoryTransactions::BatchId).uuid().null())
                        .col(
                            ColumnDef::new(InventoryTransactions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_transactions_item_id")
                                .from(InventoryTransactions::Table, InventoryTransactions::ItemId)
                                .to(Items::Table, Items::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_transactions_location_id")
                                .from(
                                    InventoryTransactions::Table,
                                    InventoryTransactions::LocationId,
                                )
                                .to(Locations::Table, Locations::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_transactions_item_location")
                        .table(InventoryTransactions::Table)
                        .col(InventoryTransactions::ItemId)
                        .col(InventoryTransactions::LocationId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_transactions_batch_id")
                        .table(InventoryTransactions::Table)
                        .col(InventoryTransactions::BatchId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_transactions_date")
                        .table(InventoryTransactions::Table)
                        .col(InventoryTransactions::Date)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(
                    Table::drop()
                        .table(InventoryTransactions::Table)
                        .to_owned(),
                )
                .await
        }
    }
}
