use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::checkout_session;
use crate::types::{AddressSnapshot, ShippingMethodSnapshot, TotalsSnapshot};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddressInput {
    #[validate(length(min = 1, max = 120))]
    pub full_name: String,
    #[validate(length(min = 8, max = 16))]
    pub phone: String,
    #[validate(length(min = 1, max = 255))]
    pub line1: String,
    pub line2: Option<String>,
    pub landmark: Option<String>,
    #[validate(length(min = 1, max = 80))]
    pub city: String,
    #[validate(length(min = 1, max = 80))]
    pub state: String,
    #[validate(length(equal = 6, message = "pincode must be 6 digits"))]
    pub pincode: String,
    #[validate(length(min = 2, max = 56))]
    pub country: String,
}

impl From<AddressInput> for AddressSnapshot {
    fn from(input: AddressInput) -> Self {
        Self {
            full_name: input.full_name,
            phone: input.phone,
            line1: input.line1,
            line2: input.line2,
            landmark: input.landmark,
            city: input.city,
            state: input.state,
            pincode: input.pincode,
            country: input.country,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct InitiateCheckoutInput {
    #[validate(nested)]
    pub shipping_address: AddressInput,
    /// Defaults to the shipping address when absent.
    #[validate(nested)]
    pub billing_address: Option<AddressInput>,
    #[validate(length(min = 1, max = 40))]
    pub shipping_method: String,
    #[validate(length(min = 1, max = 40))]
    pub payment_method: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutSessionResponse {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub status: String,
    pub totals: TotalsSnapshot,
    pub shipping_method: ShippingMethodSnapshot,
    pub payment_method: String,
    pub expires_at: DateTime<Utc>,
}

impl CheckoutSessionResponse {
    pub fn from_model(session: checkout_session::Model) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: session.id,
            cart_id: session.cart_id,
            status: match session.status {
                checkout_session::CheckoutStatus::Initiated => "initiated",
                checkout_session::CheckoutStatus::AddressEntered => "address_entered",
                checkout_session::CheckoutStatus::PaymentPending => "payment_pending",
                checkout_session::CheckoutStatus::Completed => "completed",
                checkout_session::CheckoutStatus::Failed => "failed",
                checkout_session::CheckoutStatus::Expired => "expired",
            }
            .to_string(),
            totals: serde_json::from_value(session.totals)?,
            shipping_method: serde_json::from_value(session.shipping_method)?,
            payment_method: session.payment_method,
            expires_at: session.expires_at,
        })
    }
}

/// Hand-off to the payment widget after `complete()`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutCompletionResponse {
    pub session_id: Uuid,
    pub order_id: Uuid,
    pub order_number: String,
    pub gateway_order_id: String,
    pub amount: Decimal,
    pub currency: String,
}
