use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub use super::payment::PaymentStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "out_for_delivery")]
    OutForDelivery,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "returned")]
    Returned,
    #[sea_orm(string_value = "refunded")]
    Refunded,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Returned => "returned",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Refunded | OrderStatus::Cancelled)
    }

    /// Permitted edges of the order dimension. Cancellation from
    /// processing/shipped is an admin override; everything else is the
    /// forward path plus the delivered→returned→refunded tail.
    pub fn can_transition_to(&self, next: OrderStatus, admin_override: bool) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Confirmed) => true,
            (Confirmed, Processing) => true,
            (Processing, Shipped) => true,
            (Shipped, OutForDelivery) => true,
            (OutForDelivery, Delivered) => true,
            (Delivered, Returned) => true,
            (Returned, Refunded) => true,
            (Pending | Confirmed, Cancelled) => true,
            (Processing | Shipped, Cancelled) => admin_override,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    #[sea_orm(string_value = "unfulfilled")]
    Unfulfilled,
    #[sea_orm(string_value = "partially_fulfilled")]
    PartiallyFulfilled,
    #[sea_orm(string_value = "fulfilled")]
    Fulfilled,
}

impl FulfillmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::Unfulfilled => "unfulfilled",
            FulfillmentStatus::PartiallyFulfilled => "partially_fulfilled",
            FulfillmentStatus::Fulfilled => "fulfilled",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    #[sea_orm(string_value = "customer_request")]
    CustomerRequest,
    #[sea_orm(string_value = "out_of_stock")]
    OutOfStock,
    #[sea_orm(string_value = "payment_failed")]
    PaymentFailed,
    #[sea_orm(string_value = "fraudulent")]
    Fraudulent,
    #[sea_orm(string_value = "duplicate_order")]
    DuplicateOrder,
    #[sea_orm(string_value = "other")]
    Other,
}

/// Immutable business snapshot of a confirmed purchase. Items and monetary
/// snapshots never change after creation; only the status dimensions,
/// tracking fields and `version` do. `version` is the optimistic lock every
/// transition CASes on.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,
    pub user_id: Uuid,
    /// Serialized [`crate::types::CustomerContact`].
    pub contact: Json,
    pub shipping_address: Json,
    pub billing_address: Json,
    /// Serialized [`crate::types::TotalsSnapshot`].
    pub totals: Json,
    pub payment_method: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub cancel_reason: Option<CancelReason>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    Items,
    #[sea_orm(has_many = "super::status_history::Entity")]
    History,
    #[sea_orm(has_many = "super::payment::Entity")]
    Payments,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::History.def()
    }
}

impl Related<super::payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::OrderStatus::*;

    #[test]
    fn forward_path_is_permitted() {
        assert!(Pending.can_transition_to(Confirmed, false));
        assert!(Confirmed.can_transition_to(Processing, false));
        assert!(Processing.can_transition_to(Shipped, false));
        assert!(Shipped.can_transition_to(OutForDelivery, false));
        assert!(OutForDelivery.can_transition_to(Delivered, false));
        assert!(Delivered.can_transition_to(Returned, false));
        assert!(Returned.can_transition_to(Refunded, false));
    }

    #[test]
    fn skipping_states_is_rejected() {
        assert!(!Pending.can_transition_to(Shipped, false));
        assert!(!Confirmed.can_transition_to(Delivered, true));
        assert!(!Delivered.can_transition_to(Pending, true));
    }

    #[test]
    fn cancel_needs_override_past_confirmed() {
        assert!(Pending.can_transition_to(Cancelled, false));
        assert!(Confirmed.can_transition_to(Cancelled, false));
        assert!(!Processing.can_transition_to(Cancelled, false));
        assert!(Processing.can_transition_to(Cancelled, true));
        assert!(Shipped.can_transition_to(Cancelled, true));
        assert!(!Delivered.can_transition_to(Cancelled, true));
    }
}
