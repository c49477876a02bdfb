//! Schema for the order-lifecycle tables.

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(OrdersTablesMigration)]
    }
}

#[derive(DeriveMigrationName)]
pub struct OrdersTablesMigration;

#[async_trait::async_trait]
impl MigrationTrait for OrdersTablesMigration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Carts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Carts::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Carts::UserId).uuid())
                    .col(ColumnDef::new(Carts::SessionId).string_len(128))
                    .col(ColumnDef::new(Carts::Status).string_len(32).not_null())
                    .col(ColumnDef::new(Carts::Subtotal).decimal_len(12, 2).not_null())
                    .col(
                        ColumnDef::new(Carts::DiscountTotal)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Carts::ShippingTotal)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Carts::TaxTotal).decimal_len(12, 2).not_null())
                    .col(
                        ColumnDef::new(Carts::GrandTotal)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Carts::ItemCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Carts::AppliedCoupons).json_binary().not_null())
                    .col(
                        ColumnDef::new(Carts::ReminderSent)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Carts::ReminderSentAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Carts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Carts::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Carts::DeletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_carts_user_status")
                    .table(Carts::Table)
                    .col(Carts::UserId)
                    .col(Carts::Status)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_carts_session_status")
                    .table(Carts::Table)
                    .col(Carts::SessionId)
                    .col(Carts::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CartItems::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CartItems::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(CartItems::CartId).uuid().not_null())
                    .col(ColumnDef::new(CartItems::ProductId).uuid().not_null())
                    .col(ColumnDef::new(CartItems::VariantId).uuid().not_null())
                    .col(ColumnDef::new(CartItems::BundleId).uuid())
                    .col(ColumnDef::new(CartItems::Quantity).integer().not_null())
                    .col(
                        ColumnDef::new(CartItems::UnitPrice)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CartItems::UnitMrp)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CartItems::LineDiscount)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CartItems::LineTotal)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CartItems::IsFreeGift)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(CartItems::PriceSnapshot)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CartItems::ProductExists)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(CartItems::VariantExists)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(CartItems::LastCheckedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(CartItems::PriceChanged)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(CartItems::OldPrice).decimal_len(12, 2))
                    .col(ColumnDef::new(CartItems::NewPrice).decimal_len(12, 2))
                    .col(ColumnDef::new(CartItems::PriceChangedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(CartItems::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CartItems::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(CartItems::Table, CartItems::CartId)
                            .to(Carts::Table, Carts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_cart_items_cart_variant_bundle")
                    .table(CartItems::Table)
                    .col(CartItems::CartId)
                    .col(CartItems::VariantId)
                    .col(CartItems::BundleId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CheckoutSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CheckoutSessions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CheckoutSessions::CartId).uuid().not_null())
                    .col(ColumnDef::new(CheckoutSessions::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(CheckoutSessions::ItemsSnapshot)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CheckoutSessions::ShippingAddress)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CheckoutSessions::BillingAddress)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CheckoutSessions::ShippingMethod)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CheckoutSessions::PaymentMethod)
                            .string_len(40)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CheckoutSessions::Totals)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CheckoutSessions::ReservationTokens)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CheckoutSessions::GatewayOrderId).string_len(128))
                    .col(ColumnDef::new(CheckoutSessions::OrderId).uuid())
                    .col(
                        ColumnDef::new(CheckoutSessions::Status)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CheckoutSessions::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CheckoutSessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CheckoutSessions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(CheckoutSessions::Table, CheckoutSessions::CartId)
                            .to(Carts::Table, Carts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_checkout_sessions_status_expires")
                    .table(CheckoutSessions::Table)
                    .col(CheckoutSessions::Status)
                    .col(CheckoutSessions::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Orders::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Orders::OrderNumber)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Orders::UserId).uuid().not_null())
                    .col(ColumnDef::new(Orders::Contact).json_binary().not_null())
                    .col(
                        ColumnDef::new(Orders::ShippingAddress)
                            .json_binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Orders::BillingAddress)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Orders::Totals).json_binary().not_null())
                    .col(
                        ColumnDef::new(Orders::PaymentMethod)
                            .string_len(40)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Orders::Status).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Orders::PaymentStatus)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Orders::FulfillmentStatus)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Orders::CancelReason).string_len(32))
                    .col(ColumnDef::new(Orders::TrackingNumber).string_len(128))
                    .col(ColumnDef::new(Orders::Carrier).string_len(80))
                    .col(ColumnDef::new(Orders::ShippedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Orders::DeliveredAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Orders::Version).integer().not_null().default(1))
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
                    .name("idx_orders_user_created")
                    .table(Orders::Table)
                    .col(Orders::UserId)
                    .col(Orders::CreatedAt)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_orders_status_payment")
                    .table(Orders::Table)
                    .col(Orders::Status)
                    .col(Orders::PaymentStatus)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderItems::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(OrderItems::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                    .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                    .col(ColumnDef::new(OrderItems::VariantId).uuid().not_null())
                    .col(ColumnDef::new(OrderItems::BundleId).uuid())
                    .col(ColumnDef::new(OrderItems::Sku).string_len(100))
                    .col(ColumnDef::new(OrderItems::Name).string_len(255).not_null())
                    .col(ColumnDef::new(OrderItems::ImageUrl).string_len(512))
                    .col(ColumnDef::new(OrderItems::HsnCode).string_len(20))
                    .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                    .col(
                        ColumnDef::new(OrderItems::QuantityFulfilled)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(OrderItems::QuantityReturned)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(OrderItems::QuantityRefunded)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(OrderItems::UnitPrice)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderItems::UnitMrp)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderItems::LineDiscount)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderItems::LineTax)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderItems::LineTotal)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderItems::IsFreeGift)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(OrderItems::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderItems::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(OrderItems::Table, OrderItems::OrderId)
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
                    .col(ColumnDef::new(Payments::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Payments::OrderId).uuid().not_null())
                    .col(ColumnDef::new(Payments::UserId).uuid().not_null())
                    .col(ColumnDef::new(Payments::Amount).decimal_len(12, 2).not_null())
                    .col(ColumnDef::new(Payments::Currency).string_len(8).not_null())
                    .col(ColumnDef::new(Payments::GatewayOrderId).string_len(128))
                    .col(
                        ColumnDef::new(Payments::GatewayPaymentId)
                            .string_len(128)
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Payments::Method).string_len(40).not_null())
                    .col(
                        ColumnDef::new(Payments::MethodDetails)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Payments::Status).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Payments::RefundedAmount)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Payments::PaidAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Payments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Payments::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Payments::Table, Payments::OrderId)
                            .to(Orders::Table, Orders::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_payments_status_created")
                    .table(Payments::Table)
                    .col(Payments::Status)
                    .col(Payments::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Refunds::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Refunds::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Refunds::RefundNumber)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Refunds::OrderId).uuid().not_null())
                    .col(ColumnDef::new(Refunds::PaymentId).uuid().not_null())
                    .col(ColumnDef::new(Refunds::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(Refunds::RefundAmount)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Refunds::ApprovedAmount).decimal_len(12, 2))
                    .col(ColumnDef::new(Refunds::Method).string_len(40).not_null())
                    .col(ColumnDef::new(Refunds::Status).string_len(32).not_null())
                    .col(ColumnDef::new(Refunds::Items).json_binary().not_null())
                    .col(ColumnDef::new(Refunds::Description).string_len(1000))
                    .col(ColumnDef::new(Refunds::ApprovedBy).uuid())
                    .col(ColumnDef::new(Refunds::GatewayRefundId).string_len(128))
                    .col(
                        ColumnDef::new(Refunds::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Refunds::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Refunds::Table, Refunds::OrderId)
                            .to(Orders::Table, Orders::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ReturnRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReturnRequests::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ReturnRequests::ReturnNumber)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(ReturnRequests::OrderId).uuid().not_null())
                    .col(ColumnDef::new(ReturnRequests::UserId).uuid().not_null())
                    .col(ColumnDef::new(ReturnRequests::Items).json_binary().not_null())
                    .col(
                        ColumnDef::new(ReturnRequests::Status)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReturnRequests::PickupAddress)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ReturnRequests::PickupSlot).json_binary())
                    .col(ColumnDef::new(ReturnRequests::TrackingNumber).string_len(128))
                    .col(ColumnDef::new(ReturnRequests::InspectionVerdict).string_len(32))
                    .col(ColumnDef::new(ReturnRequests::InspectionNotes).string_len(1000))
                    .col(ColumnDef::new(ReturnRequests::RefundId).uuid())
                    .col(
                        ColumnDef::new(ReturnRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReturnRequests::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(ReturnRequests::Table, ReturnRequests::OrderId)
                            .to(Orders::Table, Orders::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Invoices::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Invoices::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Invoices::InvoiceNumber)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Invoices::OrderId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Invoices::TaxLines).json_binary().not_null())
                    .col(ColumnDef::new(Invoices::Totals).json_binary().not_null())
                    .col(
                        ColumnDef::new(Invoices::GeneratedBy)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Invoices::StorageKey)
                            .string_len(512)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Invoices::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Invoices::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Invoices::Table, Invoices::OrderId)
                            .to(Orders::Table, Orders::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StatusHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StatusHistory::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StatusHistory::OrderId).uuid().not_null())
                    .col(ColumnDef::new(StatusHistory::Kind).string_len(32).not_null())
                    .col(
                        ColumnDef::new(StatusHistory::FromStatus)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StatusHistory::ToStatus)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StatusHistory::ChangedBy)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(StatusHistory::ActorId).uuid())
                    .col(ColumnDef::new(StatusHistory::Reason).string_len(500))
                    .col(
                        ColumnDef::new(StatusHistory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(StatusHistory::Table, StatusHistory::OrderId)
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
                    .name("idx_status_history_order_created")
                    .table(StatusHistory::Table)
                    .col(StatusHistory::OrderId)
                    .col(StatusHistory::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(NumberSequences::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(NumberSequences::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(NumberSequences::Kind).string_len(8).not_null())
                    .col(ColumnDef::new(NumberSequences::Year).integer().not_null())
                    .col(
                        ColumnDef::new(NumberSequences::NextValue)
                            .big_integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_number_sequences_kind_year")
                    .table(NumberSequences::Table)
                    .col(NumberSequences::Kind)
                    .col(NumberSequences::Year)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(NumberSequences::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StatusHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Invoices::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ReturnRequests::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Refunds::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OrderItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CheckoutSessions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CartItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Carts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Carts {
    Table,
    Id,
    UserId,
    SessionId,
    Status,
    Subtotal,
    DiscountTotal,
    ShippingTotal,
    TaxTotal,
    GrandTotal,
    ItemCount,
    AppliedCoupons,
    ReminderSent,
    ReminderSentAt,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum CartItems {
    Table,
    Id,
    CartId,
    ProductId,
    VariantId,
    BundleId,
    Quantity,
    UnitPrice,
    UnitMrp,
    LineDiscount,
    LineTotal,
    IsFreeGift,
    PriceSnapshot,
    ProductExists,
    VariantExists,
    LastCheckedAt,
    PriceChanged,
    OldPrice,
    NewPrice,
    PriceChangedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CheckoutSessions {
    Table,
    Id,
    CartId,
    UserId,
    ItemsSnapshot,
    ShippingAddress,
    BillingAddress,
    ShippingMethod,
    PaymentMethod,
    Totals,
    ReservationTokens,
    GatewayOrderId,
    OrderId,
    Status,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
    OrderNumber,
    UserId,
    Contact,
    ShippingAddress,
    BillingAddress,
    Totals,
    PaymentMethod,
    Status,
    PaymentStatus,
    FulfillmentStatus,
    CancelReason,
    TrackingNumber,
    Carrier,
    ShippedAt,
    DeliveredAt,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OrderItems {
    Table,
    Id,
    OrderId,
    ProductId,
    VariantId,
    BundleId,
    Sku,
    Name,
    ImageUrl,
    HsnCode,
    Quantity,
    QuantityFulfilled,
    QuantityReturned,
    QuantityRefunded,
    UnitPrice,
    UnitMrp,
    LineDiscount,
    LineTax,
    LineTotal,
    IsFreeGift,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Payments {
    Table,
    Id,
    OrderId,
    UserId,
    Amount,
    Currency,
    GatewayOrderId,
    GatewayPaymentId,
    Method,
    MethodDetails,
    Status,
    RefundedAmount,
    PaidAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Refunds {
    Table,
    Id,
    RefundNumber,
    OrderId,
    PaymentId,
    UserId,
    RefundAmount,
    ApprovedAmount,
    Method,
    Status,
    Items,
    Description,
    ApprovedBy,
    GatewayRefundId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ReturnRequests {
    Table,
    Id,
    ReturnNumber,
    OrderId,
    UserId,
    Items,
    Status,
    PickupAddress,
    PickupSlot,
    TrackingNumber,
    InspectionVerdict,
    InspectionNotes,
    RefundId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Invoices {
    Table,
    Id,
    InvoiceNumber,
    OrderId,
    TaxLines,
    Totals,
    GeneratedBy,
    StorageKey,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum StatusHistory {
    Table,
    Id,
    OrderId,
    Kind,
    FromStatus,
    ToStatus,
    ChangedBy,
    ActorId,
    Reason,
    CreatedAt,
}

#[derive(DeriveIden)]
enum NumberSequences {
    Table,
    Id,
    Kind,
    Year,
    NextValue,
}
