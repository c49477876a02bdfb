use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStatus {
    #[sea_orm(string_value = "initiated")]
    Initiated,
    #[sea_orm(string_value = "address_entered")]
    AddressEntered,
    #[sea_orm(string_value = "payment_pending")]
    PaymentPending,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl CheckoutStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckoutStatus::Completed | CheckoutStatus::Failed | CheckoutStatus::Expired
        )
    }
}

/// Time-bounded handle that freezes a cart while payment happens. The item,
/// address, shipping and totals snapshots are captured at initiation and
/// never rewritten; terminal sessions are immutable.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "checkout_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub cart_id: Uuid,
    pub user_id: Uuid,
    /// Serialized `Vec<ItemSnapshot>`.
    pub items_snapshot: Json,
    pub shipping_address: Json,
    pub billing_address: Json,
    pub shipping_method: Json,
    pub payment_method: String,
    /// Serialized [`crate::types::TotalsSnapshot`].
    pub totals: Json,
    /// Inventory reservation grants, one token per line.
    pub reservation_tokens: Json,
    pub gateway_order_id: Option<String>,
    pub order_id: Option<Uuid>,
    pub status: CheckoutStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::cart::Entity",
        from = "Column::CartId",
        to = "super::cart::Column::Id"
    )]
    Cart,
}

impl Related<super::cart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cart.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
