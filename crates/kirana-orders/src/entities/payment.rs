use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "initiated")]
    Initiated,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "authorized")]
    Authorized,
    #[sea_orm(string_value = "captured")]
    Captured,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    #[sea_orm(string_value = "partially_refunded")]
    PartiallyRefunded,
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Initiated => "initiated",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Authorized => "authorized",
            PaymentStatus::Captured => "captured",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::PartiallyRefunded => "partially_refunded",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Captured | PaymentStatus::Paid | PaymentStatus::PartiallyRefunded
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Failed | PaymentStatus::Cancelled | PaymentStatus::Refunded
        )
    }

    /// Permitted edges of the payment dimension. Webhooks and
    /// reconciliation may skip intermediate steps forward but may never
    /// regress.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        match (self, next) {
            (Pending, Initiated | Processing | Authorized | Captured | Paid | Failed | Cancelled) => true,
            (Initiated, Processing | Authorized | Captured | Paid | Failed | Cancelled) => true,
            (Processing, Authorized | Captured | Paid | Failed | Cancelled) => true,
            (Authorized, Captured | Paid | Failed | Cancelled) => true,
            (Captured, Paid | PartiallyRefunded | Refunded) => true,
            (Paid, PartiallyRefunded | Refunded) => true,
            (PartiallyRefunded, PartiallyRefunded | Refunded) => true,
            _ => false,
        }
    }
}

/// A gateway payment attempt against an order. `gateway_payment_id` is
/// unique when set; webhook replays dedupe on it. `paid_at` is monotonic:
/// once set it is never overwritten.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub gateway_order_id: Option<String>,
    #[sea_orm(unique)]
    pub gateway_payment_id: Option<String>,
    pub method: String,
    /// Serialized [`crate::types::PaymentMethodDetails`].
    pub method_details: Json,
    pub status: PaymentStatus,
    pub refunded_amount: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::PaymentStatus::*;

    #[test]
    fn webhooks_may_jump_forward() {
        assert!(Pending.can_transition_to(Captured));
        assert!(Initiated.can_transition_to(Paid));
        assert!(Captured.can_transition_to(Paid));
    }

    #[test]
    fn regressions_are_rejected() {
        assert!(!Paid.can_transition_to(Processing));
        assert!(!Captured.can_transition_to(Pending));
        assert!(!Refunded.can_transition_to(Paid));
        assert!(!Failed.can_transition_to(Paid));
    }

    #[test]
    fn refund_states_only_after_settlement() {
        assert!(!Processing.can_transition_to(Refunded));
        assert!(Paid.can_transition_to(PartiallyRefunded));
        assert!(PartiallyRefunded.can_transition_to(Refunded));
    }
}
