use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::refund;
use crate::entities::refund::RefundMethod;
use crate::types::RefundItemEntry;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RefundItemInput {
    pub order_item_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RequestRefundInput {
    pub order_id: Uuid,
    #[validate(length(min = 1, message = "at least one item is required"))]
    #[validate(nested)]
    pub items: Vec<RefundItemInput>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    #[schema(value_type = String)]
    pub method: RefundMethod,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ApproveRefundInput {
    /// Defaults to the requested amount; must not exceed it.
    pub approved_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefundResponse {
    pub id: Uuid,
    pub refund_number: String,
    pub order_id: Uuid,
    pub refund_amount: Decimal,
    pub approved_amount: Option<Decimal>,
    pub method: String,
    pub status: String,
    pub items: Vec<RefundItemEntry>,
    pub gateway_refund_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<refund::Model> for RefundResponse {
    fn from(model: refund::Model) -> Self {
        let items: Vec<RefundItemEntry> =
            serde_json::from_value(model.items.clone()).unwrap_or_default();
        Self {
            id: model.id,
            refund_number: model.refund_number,
            order_id: model.order_id,
            refund_amount: model.refund_amount,
            approved_amount: model.approved_amount,
            method: match model.method {
                RefundMethod::OriginalPaymentMethod => "original_payment_method",
                RefundMethod::BankTransfer => "bank_transfer",
                RefundMethod::StoreCredit => "store_credit",
            }
            .to_string(),
            status: model.status.as_str().to_string(),
            items,
            gateway_refund_id: model.gateway_refund_id,
            created_at: model.created_at,
        }
    }
}
