use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_directory_tables::Migration),
            Box::new(m20250301_000002_create_pricing_tables::Migration),
            Box::new(m20250301_000003_create_budget_tables::Migration),
            Box::new(m20250301_000004_create_order_tables::Migration),
            Box::new(m20250301_000005_create_settlement_tables::Migration),
        ]
    }
}

fn money(col: impl IntoIden) -> ColumnDef {
    ColumnDef::new(col)
        .decimal_len(16, 2)
        .not_null()
        .default(0)
        .to_owned()
}

fn rate(col: impl IntoIden) -> ColumnDef {
    ColumnDef::new(col)
        .decimal_len(9, 4)
        .not_null()
        .default(0)
        .to_owned()
}

mod m20250301_000001_create_directory_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000001_create_directory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Users::Name).string().not_null())
                        .col(ColumnDef::new(Users::Email).string().not_null())
                        .col(ColumnDef::new(Users::Role).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Users::Active)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Users::Commissionable)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Users::CommissionRate).decimal_len(9, 4).null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Clients::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Clients::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Clients::Name).string().not_null())
                        .col(ColumnDef::new(Clients::Phone).string().null())
                        .col(ColumnDef::new(Clients::Email).string().null())
                        .col(ColumnDef::new(Clients::Address).string().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Category).string().null())
                        .col(&mut super::money(Products::Cost))
                        .col(ColumnDef::new(Products::Width).decimal_len(12, 3).null())
                        .col(ColumnDef::new(Products::Height).decimal_len(12, 3).null())
                        .col(ColumnDef::new(Products::Depth).decimal_len(12, 3).null())
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
                .await?;
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Users {
        Table,
        Id,
        Name,
        Email,
        Role,
        Active,
        Commissionable,
        CommissionRate,
    }

    #[derive(DeriveIden)]
    enum Clients {
        Table,
        Id,
        Name,
        Phone,
        Email,
        Address,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        Name,
        Category,
        Cost,
        Width,
        Height,
        Depth,
    }
}

mod m20250301_000002_create_pricing_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000002_create_pricing_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PricingSettings::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PricingSettings::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(&mut super::rate(PricingSettings::MinimumMarginPercent))
                        .col(
                            ColumnDef::new(PricingSettings::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(MarginTiers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(MarginTiers::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(MarginTiers::SettingsId).uuid().not_null())
                        .col(&mut super::money(MarginTiers::RevenueThreshold))
                        .col(&mut super::rate(MarginTiers::MarginPercent))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_margin_tiers_settings_id")
                                .from(MarginTiers::Table, MarginTiers::SettingsId)
                                .to(PricingSettings::Table, PricingSettings::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MarginTiers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PricingSettings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PricingSettings {
        Table,
        Id,
        MinimumMarginPercent,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum MarginTiers {
        Table,
        Id,
        SettingsId,
        RevenueThreshold,
        MarginPercent,
    }
}

mod m20250301_000003_create_budget_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000003_create_budget_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Budgets::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Budgets::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Budgets::BudgetNumber)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Budgets::VendorId).uuid().not_null())
                        .col(ColumnDef::new(Budgets::ClientId).uuid().null())
                        .col(ColumnDef::new(Budgets::ContactName).string().not_null())
                        .col(ColumnDef::new(Budgets::ContactPhone).string().null())
                        .col(ColumnDef::new(Budgets::ContactEmail).string().null())
                        .col(ColumnDef::new(Budgets::ContactAddress).string().null())
                        .col(ColumnDef::new(Budgets::Status).string_len(32).not_null())
                        .col(ColumnDef::new(Budgets::DiscountType).string_len(16).not_null())
                        .col(&mut super::money(Budgets::DiscountValue))
                        .col(
                            ColumnDef::new(Budgets::DiscountAuthorized)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Budgets::AuthorizedBy).uuid().null())
                        .col(
                            ColumnDef::new(Budgets::AuthorizedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Budgets::RejectionReason).string().null())
                        .col(ColumnDef::new(Budgets::DeliveryType).string_len(16).not_null())
                        .col(&mut super::money(Budgets::ShippingCost))
                        .col(&mut super::money(Budgets::ItemsSubtotal))
                        .col(&mut super::money(Budgets::MinimumTotal))
                        .col(&mut super::money(Budgets::DiscountAmount))
                        .col(&mut super::money(Budgets::InterestAmount))
                        .col(&mut super::money(Budgets::Total))
                        .col(ColumnDef::new(Budgets::Notes).text().null())
                        .col(ColumnDef::new(Budgets::ConvertedOrderId).uuid().null())
                        .col(
                            ColumnDef::new(Budgets::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Budgets::UpdatedAt)
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
                        .name("idx_budgets_vendor_id")
                        .table(Budgets::Table)
                        .col(Budgets::VendorId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BudgetItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(BudgetItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(BudgetItems::BudgetId).uuid().not_null())
                        .col(ColumnDef::new(BudgetItems::Position).integer().not_null())
                        .col(ColumnDef::new(BudgetItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(BudgetItems::ProductName).string().not_null())
                        .col(ColumnDef::new(BudgetItems::ProducerRef).string_len(64).null())
                        .col(ColumnDef::new(BudgetItems::Quantity).integer().not_null())
                        .col(&mut super::money(BudgetItems::UnitCost))
                        .col(&mut super::money(BudgetItems::CustomizationValue))
                        .col(
                            ColumnDef::new(BudgetItems::CustomizationDescription)
                                .string()
                                .null(),
                        )
                        .col(&mut super::money(BudgetItems::GeneralCustomizationValue))
                        .col(
                            ColumnDef::new(BudgetItems::PriceSource)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(&mut super::money(BudgetItems::UnitPrice))
                        .col(&mut super::money(BudgetItems::MinimumPrice))
                        .col(&mut super::money(BudgetItems::BasePriceWithMargin))
                        .col(
                            ColumnDef::new(BudgetItems::BelowMinimum)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(BudgetItems::DiscountType)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(&mut super::money(BudgetItems::DiscountValue))
                        .col(&mut super::money(BudgetItems::DiscountAmount))
                        .col(&mut super::money(BudgetItems::TotalPrice))
                        .col(ColumnDef::new(BudgetItems::Width).decimal_len(12, 3).null())
                        .col(ColumnDef::new(BudgetItems::Height).decimal_len(12, 3).null())
                        .col(ColumnDef::new(BudgetItems::Depth).decimal_len(12, 3).null())
                        .col(
                            ColumnDef::new(BudgetItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_budget_items_budget_id")
                                .from(BudgetItems::Table, BudgetItems::BudgetId)
                                .to(Budgets::Table, Budgets::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(BudgetPayments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BudgetPayments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BudgetPayments::BudgetId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(BudgetPayments::PaymentMethod)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BudgetPayments::Installments)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(&mut super::rate(BudgetPayments::MonthlyInterestRate))
                        .col(&mut super::money(BudgetPayments::DownPayment))
                        .col(
                            ColumnDef::new(BudgetPayments::DownPaymentCustom)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(&mut super::money(BudgetPayments::RemainingAmount))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_budget_payments_budget_id")
                                .from(BudgetPayments::Table, BudgetPayments::BudgetId)
                                .to(Budgets::Table, Budgets::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BudgetPayments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(BudgetItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Budgets::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Budgets {
        Table,
        Id,
        BudgetNumber,
        VendorId,
        ClientId,
        ContactName,
        ContactPhone,
        ContactEmail,
        ContactAddress,
        Status,
        DiscountType,
        DiscountValue,
        DiscountAuthorized,
        AuthorizedBy,
        AuthorizedAt,
        RejectionReason,
        DeliveryType,
        ShippingCost,
        ItemsSubtotal,
        MinimumTotal,
        DiscountAmount,
        InterestAmount,
        Total,
        Notes,
        ConvertedOrderId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum BudgetItems {
        Table,
        Id,
        BudgetId,
        Position,
        ProductId,
        ProductName,
        ProducerRef,
        Quantity,
        UnitCost,
        CustomizationValue,
        CustomizationDescription,
        GeneralCustomizationValue,
        PriceSource,
        UnitPrice,
        MinimumPrice,
        BasePriceWithMargin,
        BelowMinimum,
        DiscountType,
        DiscountValue,
        DiscountAmount,
        TotalPrice,
        Width,
        Height,
        Depth,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum BudgetPayments {
        Table,
        Id,
        BudgetId,
        PaymentMethod,
        Installments,
        MonthlyInterestRate,
        DownPayment,
        DownPaymentCustom,
        RemainingAmount,
    }
}

mod m20250301_000004_create_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000004_create_order_tables"
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
                        .col(
                            ColumnDef::new(Orders::OrderNumber)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        // one order per budget, the last line of defence for conversion
                        .col(
                            ColumnDef::new(Orders::BudgetId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::VendorId).uuid().not_null())
                        .col(ColumnDef::new(Orders::ClientId).uuid().not_null())
                        .col(ColumnDef::new(Orders::ClientName).string().not_null())
                        .col(ColumnDef::new(Orders::ClientPhone).string().null())
                        .col(ColumnDef::new(Orders::ClientEmail).string().null())
                        .col(ColumnDef::new(Orders::ClientAddress).string().null())
                        .col(ColumnDef::new(Orders::Status).string_len(32).not_null())
                        .col(&mut super::money(Orders::ItemsSubtotal))
                        .col(ColumnDef::new(Orders::DiscountType).string_len(16).not_null())
                        .col(&mut super::money(Orders::DiscountValue))
                        .col(&mut super::money(Orders::DiscountAmount))
                        .col(ColumnDef::new(Orders::DeliveryType).string_len(16).not_null())
                        .col(&mut super::money(Orders::ShippingCost))
                        .col(ColumnDef::new(Orders::PaymentMethod).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Orders::Installments)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(&mut super::money(Orders::InterestAmount))
                        .col(&mut super::money(Orders::DownPayment))
                        .col(&mut super::money(Orders::TotalValue))
                        .col(&mut super::money(Orders::PaidValue))
                        .col(
                            ColumnDef::new(Orders::DeliveryDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Orders::TrackingCode).string().null())
                        .col(ColumnDef::new(Orders::Notes).text().null())
                        .col(
                            ColumnDef::new(Orders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
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
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::BudgetItemId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductName).string().not_null())
                        .col(ColumnDef::new(OrderItems::ProducerRef).string_len(64).null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(&mut super::money(OrderItems::UnitPrice))
                        .col(&mut super::money(OrderItems::CustomizationValue))
                        .col(
                            ColumnDef::new(OrderItems::CustomizationDescription)
                                .string()
                                .null(),
                        )
                        .col(&mut super::money(OrderItems::DiscountAmount))
                        .col(&mut super::money(OrderItems::TotalPrice))
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductionOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductionOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductionOrders::OrderId).uuid().not_null())
                        .col(ColumnDef::new(ProductionOrders::ProducerId).uuid().not_null())
                        .col(
                            ColumnDef::new(ProductionOrders::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::Deadline)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_production_orders_order_id")
                                .from(ProductionOrders::Table, ProductionOrders::OrderId)
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
                        .name("idx_production_orders_order_producer")
                        .table(ProductionOrders::Table)
                        .col(ProductionOrders::OrderId)
                        .col(ProductionOrders::ProducerId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductionOrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductionOrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrderItems::ProductionOrderId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrderItems::BudgetItemId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrderItems::ProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrderItems::ProductName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrderItems::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(&mut super::money(ProductionOrderItems::CustomizationValue))
                        .col(
                            ColumnDef::new(ProductionOrderItems::CustomizationDescription)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrderItems::Width)
                                .decimal_len(12, 3)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrderItems::Height)
                                .decimal_len(12, 3)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ProductionOrderItems::Depth)
                                .decimal_len(12, 3)
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_production_order_items_production_order_id")
                                .from(
                                    ProductionOrderItems::Table,
                                    ProductionOrderItems::ProductionOrderId,
                                )
                                .to(ProductionOrders::Table, ProductionOrders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductionOrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductionOrders::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Orders {
        Table,
        Id,
        OrderNumber,
        BudgetId,
        VendorId,
        ClientId,
        ClientName,
        ClientPhone,
        ClientEmail,
        ClientAddress,
        Status,
        ItemsSubtotal,
        DiscountType,
        DiscountValue,
        DiscountAmount,
        DeliveryType,
        ShippingCost,
        PaymentMethod,
        Installments,
        InterestAmount,
        DownPayment,
        TotalValue,
        PaidValue,
        DeliveryDate,
        TrackingCode,
        Notes,
        Version,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        BudgetItemId,
        ProductId,
        ProductName,
        ProducerRef,
        Quantity,
        UnitPrice,
        CustomizationValue,
        CustomizationDescription,
        DiscountAmount,
        TotalPrice,
    }

    #[derive(DeriveIden)]
    enum ProductionOrders {
        Table,
        Id,
        OrderId,
        ProducerId,
        Status,
        Deadline,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum ProductionOrderItems {
        Table,
        Id,
        ProductionOrderId,
        BudgetItemId,
        ProductId,
        ProductName,
        Quantity,
        CustomizationValue,
        CustomizationDescription,
        Width,
        Height,
        Depth,
    }
}

mod m20250301_000005_create_settlement_tables {
    use super::m20250301_000004_create_order_tables::Orders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000005_create_settlement_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Commissions::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Commissions::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Commissions::OrderId).uuid().not_null())
                        .col(ColumnDef::new(Commissions::PayeeId).uuid().not_null())
                        .col(
                            ColumnDef::new(Commissions::CommissionType)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(&mut super::rate(Commissions::Percentage))
                        .col(&mut super::money(Commissions::Amount))
                        .col(&mut super::money(Commissions::OrderValue))
                        .col(ColumnDef::new(Commissions::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Commissions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Commissions::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_commissions_order_id")
                                .from(Commissions::Table, Commissions::OrderId)
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
                        .name("idx_commissions_order_payee_type")
                        .table(Commissions::Table)
                        .col(Commissions::OrderId)
                        .col(Commissions::PayeeId)
                        .col(Commissions::CommissionType)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(AccountsReceivable::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AccountsReceivable::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AccountsReceivable::OrderId)
                                .uuid()
                                .null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(AccountsReceivable::ClientId).uuid().null())
                        .col(
                            ColumnDef::new(AccountsReceivable::Description)
                                .string()
                                .not_null(),
                        )
                        .col(&mut super::money(AccountsReceivable::Amount))
                        .col(&mut super::money(AccountsReceivable::ReceivedAmount))
                        .col(&mut super::money(AccountsReceivable::MinimumPayment))
                        .col(
                            ColumnDef::new(AccountsReceivable::DueDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(AccountsReceivable::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AccountsReceivable::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AccountsReceivable::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_accounts_receivable_order_id")
                                .from(AccountsReceivable::Table, AccountsReceivable::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Payments::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Payments::OrderId).uuid().null())
                        .col(ColumnDef::new(Payments::ReceivableId).uuid().not_null())
                        .col(&mut super::money(Payments::Amount))
                        .col(ColumnDef::new(Payments::Method).string_len(32).not_null())
                        .col(ColumnDef::new(Payments::Status).string_len(32).not_null())
                        .col(ColumnDef::new(Payments::Notes).string().null())
                        .col(
                            ColumnDef::new(Payments::PaidAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Payments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_payments_receivable_id")
                                .from(Payments::Table, Payments::ReceivableId)
                                .to(AccountsReceivable::Table, AccountsReceivable::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payments_order_id")
                        .table(Payments::Table)
                        .col(Payments::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(AccountsReceivable::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Commissions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Commissions {
        Table,
        Id,
        OrderId,
        PayeeId,
        CommissionType,
        Percentage,
        Amount,
        OrderValue,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum AccountsReceivable {
        Table,
        Id,
        OrderId,
        ClientId,
        Description,
        Amount,
        ReceivedAmount,
        MinimumPayment,
        DueDate,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Payments {
        Table,
        Id,
        OrderId,
        ReceivableId,
        Amount,
        Method,
        Status,
        Notes,
        PaidAt,
        CreatedAt,
    }
}
