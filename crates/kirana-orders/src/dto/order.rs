use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::{order, order_item, status_history};
use crate::entities::order::{CancelReason, OrderStatus};
use crate::types::{AddressSnapshot, CustomerContact, TotalsSnapshot};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CancelOrderInput {
    #[schema(value_type = String)]
    pub reason: CancelReason,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

/// Admin transition request. `tracking_number`/`carrier` only apply to the
/// shipped edge.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderStatusInput {
    #[schema(value_type = String)]
    pub status: OrderStatus,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    /// Required when `status` is `cancelled`.
    #[schema(value_type = Option<String>)]
    pub cancel_reason: Option<CancelReason>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    /// Expected order version; mismatch is a 409.
    pub version: Option<i32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub sku: Option<String>,
    pub name: String,
    pub image_url: Option<String>,
    pub quantity: i32,
    pub quantity_fulfilled: i32,
    pub quantity_returned: i32,
    pub quantity_refunded: i32,
    pub unit_price: Decimal,
    pub line_discount: Decimal,
    pub line_tax: Decimal,
    pub line_total: Decimal,
    pub is_free_gift: bool,
}

impl From<order_item::Model> for OrderItemResponse {
    fn from(item: order_item::Model) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            variant_id: item.variant_id,
            sku: item.sku,
            name: item.name,
            image_url: item.image_url,
            quantity: item.quantity,
            quantity_fulfilled: item.quantity_fulfilled,
            quantity_returned: item.quantity_returned,
            quantity_refunded: item.quantity_refunded,
            unit_price: item.unit_price,
            line_discount: item.line_discount,
            line_tax: item.line_tax,
            line_total: item.line_total,
            is_free_gift: item.is_free_gift,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusHistoryResponse {
    pub kind: String,
    pub from_status: String,
    pub to_status: String,
    pub changed_by: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<status_history::Model> for StatusHistoryResponse {
    fn from(row: status_history::Model) -> Self {
        Self {
            kind: match row.kind {
                status_history::HistoryKind::Order => "order",
                status_history::HistoryKind::Payment => "payment",
                status_history::HistoryKind::Fulfillment => "fulfillment",
            }
            .to_string(),
            from_status: row.from_status,
            to_status: row.to_status,
            changed_by: match row.changed_by {
                status_history::ActorKind::System => "system",
                status_history::ActorKind::Admin => "admin",
                status_history::ActorKind::Customer => "customer",
            }
            .to_string(),
            reason: row.reason,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub status: String,
    pub payment_status: String,
    pub fulfillment_status: String,
    pub contact: CustomerContact,
    pub shipping_address: AddressSnapshot,
    pub billing_address: AddressSnapshot,
    pub totals: TotalsSnapshot,
    pub payment_method: String,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub items: Vec<OrderItemResponse>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<StatusHistoryResponse>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl OrderResponse {
    pub fn from_models(
        order: order::Model,
        items: Vec<order_item::Model>,
        history: Vec<status_history::Model>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: order.id,
            order_number: order.order_number,
            status: order.status.as_str().to_string(),
            payment_status: order.payment_status.as_str().to_string(),
            fulfillment_status: order.fulfillment_status.as_str().to_string(),
            contact: serde_json::from_value(order.contact)?,
            shipping_address: serde_json::from_value(order.shipping_address)?,
            billing_address: serde_json::from_value(order.billing_address)?,
            totals: serde_json::from_value(order.totals)?,
            payment_method: order.payment_method,
            tracking_number: order.tracking_number,
            carrier: order.carrier,
            items: items.into_iter().map(OrderItemResponse::from).collect(),
            history: history.into_iter().map(StatusHistoryResponse::from).collect(),
            version: order.version,
            created_at: order.created_at,
            delivered_at: order.delivered_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderListItem {
    pub id: Uuid,
    pub order_number: String,
    pub status: String,
    pub payment_status: String,
    pub grand_total: Decimal,
    pub item_count: i32,
    pub created_at: DateTime<Utc>,
}

impl OrderListItem {
    pub fn from_model(order: order::Model) -> Self {
        let totals: TotalsSnapshot = serde_json::from_value(order.totals).unwrap_or(TotalsSnapshot {
            subtotal: Decimal::ZERO,
            discount_total: Decimal::ZERO,
            shipping_total: Decimal::ZERO,
            tax_total: Decimal::ZERO,
            grand_total: Decimal::ZERO,
            item_count: 0,
        });
        Self {
            id: order.id,
            order_number: order.order_number,
            status: order.status.as_str().to_string(),
            payment_status: order.payment_status.as_str().to_string(),
            grand_total: totals.grand_total,
            item_count: totals.item_count,
            created_at: order.created_at,
        }
    }
}
