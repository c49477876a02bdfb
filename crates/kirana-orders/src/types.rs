//! Immutable snapshot records.
//!
//! Snapshots preserve historical truth: an order keeps the address, totals
//! and per-line prices as they were at the moment of the transition, no
//! matter how the catalog mutates afterwards. They are persisted as JSON
//! columns and never rewritten once their owning row reaches a terminal
//! state.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AddressSnapshot {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub landmark: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PriceSnapshot {
    pub unit_price: Decimal,
    pub unit_mrp: Decimal,
    pub captured_at: DateTime<Utc>,
    pub discount_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TotalsSnapshot {
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub shipping_total: Decimal,
    pub tax_total: Decimal,
    pub grand_total: Decimal,
    pub item_count: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ShippingMethodSnapshot {
    pub code: String,
    pub name: String,
    pub rate: Decimal,
    #[serde(default)]
    pub estimated_days: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AppliedCoupon {
    pub code: String,
    pub coupon_id: Uuid,
    pub discount_amount: Decimal,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CustomerContact {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Safe payment-method snapshot. Raw instruments never reach the datastore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentMethodDetails {
    Upi { masked_vpa: String },
    Card { last4: String, network: Option<String> },
    NetBanking { bank_name: String },
    Cod,
}

/// Mask a UPI VPA: first 2 and last 1 character of the local part survive,
/// the domain is preserved. `someone@upi` → `so****e@upi`.
pub fn mask_upi(vpa: &str) -> String {
    match vpa.split_once('@') {
        Some((local, domain)) => {
            let chars: Vec<char> = local.chars().collect();
            if chars.len() <= 3 {
                format!("{}@{}", "*".repeat(chars.len()), domain)
            } else {
                let head: String = chars[..2].iter().collect();
                let tail = chars[chars.len() - 1];
                let masked = "*".repeat(chars.len() - 3);
                format!("{head}{masked}{tail}@{domain}")
            }
        }
        None => "*".repeat(vpa.chars().count()),
    }
}

/// Keep only the last 4 digits of a card number.
pub fn card_last4(number: &str) -> String {
    let digits: Vec<char> = number.chars().filter(char::is_ascii_digit).collect();
    digits.iter().rev().take(4).rev().collect()
}

/// One line of a checkout-session / order item snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ItemSnapshot {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    #[serde(default)]
    pub bundle_id: Option<Uuid>,
    #[serde(default)]
    pub sku: Option<String>,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub hsn_code: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub unit_mrp: Decimal,
    pub line_discount: Decimal,
    pub line_tax: Decimal,
    pub line_total: Decimal,
    pub is_free_gift: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RefundItemEntry {
    pub order_item_id: Uuid,
    pub quantity: i32,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReturnItemEntry {
    pub order_item_id: Uuid,
    pub quantity: i32,
    pub reason: String,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PickupSlot {
    pub date: NaiveDate,
    pub window: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaxLine {
    pub hsn_code: String,
    pub taxable_value: Decimal,
    pub rate_percent: Decimal,
    pub tax_amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WarningSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RevalidationWarning {
    pub code: String,
    pub severity: WarningSeverity,
    pub message: String,
    #[serde(default)]
    pub amount_delta: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PriceChange {
    pub cart_item_id: Uuid,
    pub variant_id: Uuid,
    pub old_price: Decimal,
    pub new_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UnavailableItem {
    pub cart_item_id: Uuid,
    pub variant_id: Uuid,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_upi_keeping_first_two_and_last_one() {
        assert_eq!(mask_upi("someone@upi"), "so****e@upi");
        assert_eq!(mask_upi("ab@upi"), "**@upi");
        assert_eq!(mask_upi("abcd@okbank"), "ab*d@okbank");
    }

    #[test]
    fn masks_upi_without_domain() {
        assert_eq!(mask_upi("abcdef"), "******");
    }

    #[test]
    fn card_keeps_last_four_digits_only() {
        assert_eq!(card_last4("4111 1111 1111 1234"), "1234");
        assert_eq!(card_last4("123"), "123");
    }
}
