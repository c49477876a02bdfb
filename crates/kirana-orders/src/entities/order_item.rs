use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-line order snapshot. Monetary fields are frozen at order creation;
/// only the fulfillment counters move, under the invariants
/// `quantity_fulfilled + quantity_returned + quantity_refunded <= quantity`
/// and `quantity_returned <= quantity_fulfilled`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub bundle_id: Option<Uuid>,
    pub sku: Option<String>,
    pub name: String,
    pub image_url: Option<String>,
    pub hsn_code: Option<String>,
    pub quantity: i32,
    pub quantity_fulfilled: i32,
    pub quantity_returned: i32,
    pub quantity_refunded: i32,
    pub unit_price: Decimal,
    pub unit_mrp: Decimal,
    pub line_discount: Decimal,
    pub line_tax: Decimal,
    pub line_total: Decimal,
    pub is_free_gift: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn remaining_refundable(&self) -> i32 {
        self.quantity - self.quantity_refunded
    }

    pub fn remaining_returnable(&self) -> i32 {
        self.quantity_fulfilled - self.quantity_returned
    }
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
