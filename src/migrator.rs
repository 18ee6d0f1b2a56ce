use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_counters_table::Migration),
            Box::new(m20260301_000002_create_catalog_tables::Migration),
            Box::new(m20260301_000003_create_quotes_tables::Migration),
            Box::new(m20260301_000004_create_orders_tables::Migration),
            Box::new(m20260301_000005_create_delivery_notes_tables::Migration),
            Box::new(m20260301_000006_create_sales_table::Migration),
        ]
    }
}

mod m20260301_000001_create_counters_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260301_000001_create_counters_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Primary key on name backs the ON CONFLICT upsert used for allocation
            manager
                .create_table(
                    Table::create()
                        .table(Counters::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Counters::Name)
                                .string_len(64)
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Counters::Seq)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Counters::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Counters {
        Table,
        Name,
        Seq,
    }
}

mod m20260301_000002_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260301_000002_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Clients::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Clients::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Clients::Name).string().not_null())
                        .col(ColumnDef::new(Clients::Email).string().null())
                        .col(ColumnDef::new(Clients::Phone).string().null())
                        .col(ColumnDef::new(Clients::City).string().null())
                        .col(ColumnDef::new(Clients::Address).string().null())
                        .col(
                            ColumnDef::new(Clients::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Code).string().null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(
                            ColumnDef::new(Products::Price)
                                .decimal_len(18, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::Stock)
                                .integer()
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
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Clients::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Clients {
        Table,
        Id,
        Name,
        Email,
        Phone,
        City,
        Address,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        Name,
        Code,
        Description,
        Price,
        Stock,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20260301_000003_create_quotes_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260301_000003_create_quotes_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Quotes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Quotes::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Quotes::Code).string_len(16).not_null())
                        .col(ColumnDef::new(Quotes::ClientId).uuid().null())
                        .col(ColumnDef::new(Quotes::ClientName).string().not_null())
                        .col(ColumnDef::new(Quotes::ClientEmail).string().null())
                        .col(ColumnDef::new(Quotes::ClientPhone).string().null())
                        .col(ColumnDef::new(Quotes::ClientCity).string().null())
                        .col(ColumnDef::new(Quotes::ClientAddress).string().null())
                        .col(ColumnDef::new(Quotes::ResponsibleId).uuid().null())
                        .col(ColumnDef::new(Quotes::Status).string_len(16).not_null())
                        .col(ColumnDef::new(Quotes::OrderId).uuid().null())
                        .col(
                            ColumnDef::new(Quotes::Total)
                                .decimal_len(18, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Quotes::Observations).text().null())
                        .col(
                            ColumnDef::new(Quotes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Quotes::UpdatedAt)
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
                        .name("uq_quotes_code")
                        .table(Quotes::Table)
                        .col(Quotes::Code)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_quotes_status")
                        .table(Quotes::Table)
                        .col(Quotes::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(QuoteItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(QuoteItems::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(QuoteItems::QuoteId).uuid().not_null())
                        .col(ColumnDef::new(QuoteItems::Position).integer().not_null())
                        .col(ColumnDef::new(QuoteItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(QuoteItems::ProductName).string().not_null())
                        .col(ColumnDef::new(QuoteItems::Quantity).integer().not_null())
                        .col(ColumnDef::new(QuoteItems::UnitPrice).decimal_len(18, 4).null())
                        .col(ColumnDef::new(QuoteItems::UnitValue).decimal_len(18, 4).null())
                        .col(
                            ColumnDef::new(QuoteItems::Discount)
                                .decimal_len(7, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(QuoteItems::Subtotal)
                                .decimal_len(18, 4)
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_quote_items_quote_id")
                                .from(QuoteItems::Table, QuoteItems::QuoteId)
                                .to(Quotes::Table, Quotes::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_quote_items_quote_id")
                        .table(QuoteItems::Table)
                        .col(QuoteItems::QuoteId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(QuoteItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Quotes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Quotes {
        Table,
        Id,
        Code,
        ClientId,
        ClientName,
        ClientEmail,
        ClientPhone,
        ClientCity,
        ClientAddress,
        ResponsibleId,
        Status,
        OrderId,
        Total,
        Observations,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum QuoteItems {
        Table,
        Id,
        QuoteId,
        Position,
        ProductId,
        ProductName,
        Quantity,
        UnitPrice,
        UnitValue,
        Discount,
        Subtotal,
    }
}

mod m20260301_000004_create_orders_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260301_000004_create_orders_tables"
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
                        .col(ColumnDef::new(Orders::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Orders::OrderNumber).string_len(32).not_null())
                        .col(ColumnDef::new(Orders::QuoteId).uuid().null())
                        .col(ColumnDef::new(Orders::QuoteCode).string_len(16).null())
                        .col(ColumnDef::new(Orders::ClientId).uuid().null())
                        .col(
                            ColumnDef::new(Orders::DeliveryDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Orders::Observation).text().null())
                        .col(ColumnDef::new(Orders::Status).string_len(16).not_null())
                        .col(ColumnDef::new(Orders::ResponsibleId).uuid().null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
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
                        .name("uq_orders_order_number")
                        .table(Orders::Table)
                        .col(Orders::OrderNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            // product_id stays unconstrained: products may be removed after the fact
            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::Position).integer().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(18, 4)
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
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
        OrderNumber,
        QuoteId,
        QuoteCode,
        ClientId,
        DeliveryDate,
        Observation,
        Status,
        ResponsibleId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        Position,
        ProductId,
        Quantity,
        UnitPrice,
    }
}

mod m20260301_000005_create_delivery_notes_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260301_000005_create_delivery_notes_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DeliveryNotes::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryNotes::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(DeliveryNotes::Number).string_len(32).not_null())
                        .col(ColumnDef::new(DeliveryNotes::OrderId).uuid().not_null())
                        .col(ColumnDef::new(DeliveryNotes::OrderCode).string_len(32).not_null())
                        .col(ColumnDef::new(DeliveryNotes::QuoteId).uuid().null())
                        .col(ColumnDef::new(DeliveryNotes::QuoteCode).string_len(16).null())
                        .col(ColumnDef::new(DeliveryNotes::ClientName).string().not_null())
                        .col(ColumnDef::new(DeliveryNotes::ClientEmail).string().null())
                        .col(ColumnDef::new(DeliveryNotes::ClientPhone).string().null())
                        .col(ColumnDef::new(DeliveryNotes::ClientCity).string().null())
                        .col(ColumnDef::new(DeliveryNotes::ClientAddress).string().null())
                        .col(ColumnDef::new(DeliveryNotes::ResponsibleId).uuid().null())
                        .col(ColumnDef::new(DeliveryNotes::Status).string_len(16).not_null())
                        .col(
                            ColumnDef::new(DeliveryNotes::Subtotal)
                                .decimal_len(18, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryNotes::Total)
                                .decimal_len(18, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryNotes::ItemCount).integer().not_null())
                        .col(
                            ColumnDef::new(DeliveryNotes::TotalQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryNotes::IssuedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryNotes::DeliveryDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(DeliveryNotes::Observations).text().null())
                        .col(
                            ColumnDef::new(DeliveryNotes::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryNotes::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_notes_order_id")
                                .from(DeliveryNotes::Table, DeliveryNotes::OrderId)
                                .to(Orders::Table, Orders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_delivery_notes_number")
                        .table(DeliveryNotes::Table)
                        .col(DeliveryNotes::Number)
                        .unique()
                        .to_owned(),
                )
                .await?;

            // One delivery note per order
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_delivery_notes_order_id")
                        .table(DeliveryNotes::Table)
                        .col(DeliveryNotes::OrderId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(DeliveryNoteItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryNoteItems::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(DeliveryNoteItems::DeliveryNoteId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryNoteItems::Position)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryNoteItems::Name).string().not_null())
                        .col(
                            ColumnDef::new(DeliveryNoteItems::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryNoteItems::UnitPrice)
                                .decimal_len(18, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryNoteItems::Total)
                                .decimal_len(18, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryNoteItems::Description).text().null())
                        .col(ColumnDef::new(DeliveryNoteItems::Code).string().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_delivery_note_items_note_id")
                                .from(DeliveryNoteItems::Table, DeliveryNoteItems::DeliveryNoteId)
                                .to(DeliveryNotes::Table, DeliveryNotes::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_delivery_note_items_note_id")
                        .table(DeliveryNoteItems::Table)
                        .col(DeliveryNoteItems::DeliveryNoteId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DeliveryNoteItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(DeliveryNotes::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum DeliveryNotes {
        Table,
        Id,
        Number,
        OrderId,
        OrderCode,
        QuoteId,
        QuoteCode,
        ClientName,
        ClientEmail,
        ClientPhone,
        ClientCity,
        ClientAddress,
        ResponsibleId,
        Status,
        Subtotal,
        Total,
        ItemCount,
        TotalQuantity,
        IssuedAt,
        DeliveryDate,
        Observations,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum DeliveryNoteItems {
        Table,
        Id,
        DeliveryNoteId,
        Position,
        Name,
        Quantity,
        UnitPrice,
        Total,
        Description,
        Code,
    }
}

mod m20260301_000006_create_sales_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20260301_000006_create_sales_table"
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
                        .col(ColumnDef::new(Sales::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Sales::OrderId).uuid().not_null())
                        .col(ColumnDef::new(Sales::OrderNumber).string_len(32).not_null())
                        .col(ColumnDef::new(Sales::Items).json().not_null())
                        .col(ColumnDef::new(Sales::Total).decimal_len(18, 4).not_null())
                        .col(ColumnDef::new(Sales::ItemCount).integer().not_null())
                        .col(
                            ColumnDef::new(Sales::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sales_order_id")
                                .from(Sales::Table, Sales::OrderId)
                                .to(Orders::Table, Orders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sales_order_id")
                        .table(Sales::Table)
                        .col(Sales::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Sales::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Sales {
        Table,
        Id,
        OrderId,
        OrderNumber,
        Items,
        Total,
        ItemCount,
        CreatedAt,
    }
}
