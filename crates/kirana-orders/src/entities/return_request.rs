use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    #[sea_orm(string_value = "requested")]
    Requested,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "pickup_scheduled")]
    PickupScheduled,
    #[sea_orm(string_value = "picked_up")]
    PickedUp,
    #[sea_orm(string_value = "in_transit")]
    InTransit,
    #[sea_orm(string_value = "received")]
    Received,
    #[sea_orm(string_value = "inspected")]
    Inspected,
    #[sea_orm(string_value = "refund_initiated")]
    RefundInitiated,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl ReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Requested => "requested",
            ReturnStatus::Approved => "approved",
            ReturnStatus::Rejected => "rejected",
            ReturnStatus::PickupScheduled => "pickup_scheduled",
            ReturnStatus::PickedUp => "picked_up",
            ReturnStatus::InTransit => "in_transit",
            ReturnStatus::Received => "received",
            ReturnStatus::Inspected => "inspected",
            ReturnStatus::RefundInitiated => "refund_initiated",
            ReturnStatus::Completed => "completed",
            ReturnStatus::Cancelled => "cancelled",
        }
    }

    /// Forward chain plus admin rejection at `requested`, customer cancel
    /// from `requested`/`approved`, and the inspected→cancelled edge a
    /// rejecting verdict takes.
    pub fn can_transition_to(&self, next: ReturnStatus) -> bool {
        use ReturnStatus::*;
        match (self, next) {
            (Requested, Approved | Rejected | Cancelled) => true,
            (Approved, PickupScheduled | Cancelled) => true,
            (PickupScheduled, PickedUp) => true,
            (PickedUp, InTransit) => true,
            (InTransit, Received) => true,
            (Received, Inspected) => true,
            (Inspected, RefundInitiated | Cancelled) => true,
            (RefundInitiated, Completed) => true,
            _ => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum InspectionVerdict {
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "partial")]
    Partial,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "return_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub return_number: String,
    pub order_id: Uuid,
    pub user_id: Uuid,
    /// Serialized `Vec<ReturnItemEntry>`.
    pub items: Json,
    pub status: ReturnStatus,
    /// Serialized [`crate::types::AddressSnapshot`].
    pub pickup_address: Json,
    /// Serialized [`crate::types::PickupSlot`].
    pub pickup_slot: Option<Json>,
    pub tracking_number: Option<String>,
    pub inspection_verdict: Option<InspectionVerdict>,
    pub inspection_notes: Option<String>,
    pub refund_id: Option<Uuid>,
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
    use super::ReturnStatus::*;

    #[test]
    fn forward_chain_is_permitted() {
        let chain = [
            Requested,
            Approved,
            PickupScheduled,
            PickedUp,
            InTransit,
            Received,
            Inspected,
            RefundInitiated,
            Completed,
        ];
        for pair in chain.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn cancel_only_early_or_after_rejected_inspection() {
        assert!(Requested.can_transition_to(Cancelled));
        assert!(Approved.can_transition_to(Cancelled));
        assert!(Inspected.can_transition_to(Cancelled));
        assert!(!PickedUp.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
    }
}
