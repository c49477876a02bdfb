use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::payment;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct VerifySignatureInput {
    #[validate(length(min = 1, max = 128))]
    pub gateway_order_id: String,
    #[validate(length(min = 1, max = 128))]
    pub gateway_payment_id: String,
    #[validate(length(min = 1, max = 256))]
    pub signature: String,
}

/// Payment-gateway webhook body. Unknown `event` values are acknowledged
/// and ignored.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookPayload {
    pub event: String,
    pub gateway_payment_id: String,
    #[serde(default)]
    pub gateway_order_id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub gateway_refund_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub method: String,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub refunded_amount: Decimal,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<payment::Model> for PaymentResponse {
    fn from(model: payment::Model) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            amount: model.amount,
            currency: model.currency,
            status: model.status.as_str().to_string(),
            method: model.method,
            gateway_order_id: model.gateway_order_id,
            gateway_payment_id: model.gateway_payment_id,
            refunded_amount: model.refunded_amount,
            paid_at: model.paid_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentStatsResponse {
    pub total_count: u64,
    pub by_status: HashMap<String, u64>,
    pub captured_amount: Decimal,
    pub refunded_amount: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReconciliationStats {
    pub scanned: usize,
    pub updated: usize,
    pub errors: usize,
}
