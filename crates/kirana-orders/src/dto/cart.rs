use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::{cart, cart_item};
use crate::types::{AppliedCoupon, RevalidationWarning};

/// Who owns a cart: a registered user or a guest session. Exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(Uuid),
    Guest(String),
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddItemInput {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub bundle_id: Option<Uuid>,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateQuantityInput {
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ApplyCouponInput {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct MigrateCartInput {
    #[validate(length(min = 1, max = 128))]
    pub guest_session_id: String,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub bundle_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub unit_mrp: Decimal,
    pub line_discount: Decimal,
    pub line_total: Decimal,
    pub is_free_gift: bool,
    pub price_changed: bool,
    pub old_price: Option<Decimal>,
    pub new_price: Option<Decimal>,
    pub available: bool,
}

impl From<cart_item::Model> for CartItemResponse {
    fn from(item: cart_item::Model) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            variant_id: item.variant_id,
            bundle_id: item.bundle_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            unit_mrp: item.unit_mrp,
            line_discount: item.line_discount,
            line_total: item.line_total,
            is_free_gift: item.is_free_gift,
            price_changed: item.price_changed,
            old_price: item.old_price,
            new_price: item.new_price,
            available: item.product_exists && item.variant_exists,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartResponse {
    pub id: Uuid,
    pub status: String,
    pub items: Vec<CartItemResponse>,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub shipping_total: Decimal,
    pub tax_total: Decimal,
    pub grand_total: Decimal,
    pub item_count: i32,
    pub applied_coupons: Vec<AppliedCoupon>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<RevalidationWarning>,
    pub updated_at: DateTime<Utc>,
}

impl CartResponse {
    pub fn from_models(
        cart: cart::Model,
        items: Vec<cart_item::Model>,
        warnings: Vec<RevalidationWarning>,
    ) -> Self {
        let applied_coupons: Vec<AppliedCoupon> =
            serde_json::from_value(cart.applied_coupons.clone()).unwrap_or_default();
        Self {
            id: cart.id,
            status: match cart.status {
                cart::CartStatus::Active => "active",
                cart::CartStatus::Abandoned => "abandoned",
                cart::CartStatus::Converted => "converted",
            }
            .to_string(),
            items: items.into_iter().map(CartItemResponse::from).collect(),
            subtotal: cart.subtotal,
            discount_total: cart.discount_total,
            shipping_total: cart.shipping_total,
            tax_total: cart.tax_total,
            grand_total: cart.grand_total,
            item_count: cart.item_count,
            applied_coupons,
            warnings,
            updated_at: cart.updated_at,
        }
    }
}
