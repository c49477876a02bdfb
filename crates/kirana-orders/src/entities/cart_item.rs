use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One line of a cart. (cart_id, variant_id, bundle_id) is unique; adding
/// the same variant again coalesces into `quantity`. `line_total` is always
/// `quantity * unit_price - line_discount`, clamped at zero.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cart_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub bundle_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub unit_mrp: Decimal,
    pub line_discount: Decimal,
    pub line_total: Decimal,
    pub is_free_gift: bool,
    /// Serialized [`crate::types::PriceSnapshot`].
    pub price_snapshot: Json,
    pub product_exists: bool,
    pub variant_exists: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub price_changed: bool,
    pub old_price: Option<Decimal>,
    pub new_price: Option<Decimal>,
    pub price_changed_at: Option<DateTime<Utc>>,
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
