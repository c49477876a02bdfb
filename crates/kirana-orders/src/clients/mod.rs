//! Collaborating services, specified at their interface.
//!
//! The engine never talks to catalog/pricing/inventory/shipping/gateway/
//! notification directly; it goes through these traits. Production wires
//! the reqwest implementations from [`http`]; tests wire the mocks from
//! `kirana-test-utils`. Every call is bounded by the per-service deadline
//! configured on the client.

pub mod http;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{AddressSnapshot, CustomerContact, ShippingMethodSnapshot, TaxLine, TotalsSnapshot};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl ClientError {
    fn from_reqwest(err: reqwest::Error, deadline: Duration) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(deadline)
        } else if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductLifecycle {
    Active,
    Draft,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub status: ProductLifecycle,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub hsn_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantSummary {
    pub id: Uuid,
    pub product_id: Uuid,
    #[serde(default)]
    pub sku: Option<String>,
    pub active: bool,
    #[serde(default)]
    pub max_per_order: Option<i32>,
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn product(&self, product_id: Uuid) -> ClientResult<Option<ProductSummary>>;
    async fn variant(&self, variant_id: Uuid) -> ClientResult<Option<VariantSummary>>;
}

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantPrice {
    pub variant_id: Uuid,
    pub final_price: Decimal,
    pub mrp: Decimal,
    pub discount_percent: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponValidation {
    pub coupon_id: Uuid,
    pub code: String,
    pub kind: String,
    pub discount_amount: Decimal,
    pub valid: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[async_trait]
pub trait PricingClient: Send + Sync {
    /// One bulk call for all variants of a cart.
    async fn prices(&self, variant_ids: &[Uuid]) -> ClientResult<HashMap<Uuid, VariantPrice>>;

    async fn validate_coupon(
        &self,
        code: &str,
        subtotal: Decimal,
        user_id: Option<Uuid>,
    ) -> ClientResult<CouponValidation>;
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Reserve `quantity` of a variant for `ttl`; returns the grant token.
    async fn reserve_line(&self, variant_id: Uuid, quantity: i32, ttl: Duration)
        -> ClientResult<String>;

    /// Release grants. Unknown/expired tokens are not an error.
    async fn release(&self, tokens: &[String]) -> ClientResult<()>;
}

// ---------------------------------------------------------------------------
// Shipping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub serviceable: bool,
    pub method: ShippingMethodSnapshot,
}

#[async_trait]
pub trait ShippingClient: Send + Sync {
    async fn quote(
        &self,
        method_code: &str,
        address: &AddressSnapshot,
        item_count: i32,
        subtotal: Decimal,
    ) -> ClientResult<ShippingQuote>;
}

// ---------------------------------------------------------------------------
// Payment gateway
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayPaymentStatus {
    Created,
    Authorized,
    Captured,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayment {
    pub id: String,
    pub order_id: String,
    pub status: GatewayPaymentStatus,
    pub amount: i64,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRefund {
    pub id: String,
    pub status: String,
}

#[async_trait]
pub trait PaymentGatewayClient: Send + Sync {
    /// Create a payment order. The idempotency key makes retried calls
    /// return the original order instead of charging twice.
    async fn create_order(
        &self,
        amount_paise: i64,
        currency: &str,
        receipt: &str,
        idempotency_key: &str,
    ) -> ClientResult<GatewayOrder>;

    async fn fetch_payment(&self, gateway_payment_id: &str) -> ClientResult<GatewayPayment>;

    async fn create_refund(
        &self,
        gateway_payment_id: &str,
        amount_paise: i64,
        idempotency_key: &str,
    ) -> ClientResult<GatewayRefund>;
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[async_trait]
pub trait NotificationClient: Send + Sync {
    async fn cart_reminder(&self, user_id: Uuid, cart_id: Uuid) -> ClientResult<()>;
}

// ---------------------------------------------------------------------------
// Invoice renderer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub hsn_code: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_discount: Decimal,
    pub line_tax: Decimal,
    pub line_total: Decimal,
}

/// Everything the PDF renderer needs; a pure function of the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceDocument {
    pub invoice_number: String,
    pub order_number: String,
    pub customer: CustomerContact,
    pub billing_address: AddressSnapshot,
    pub lines: Vec<InvoiceLine>,
    pub tax_lines: Vec<TaxLine>,
    pub totals: TotalsSnapshot,
}

#[async_trait]
pub trait InvoiceRenderer: Send + Sync {
    /// Render to PDF and persist; returns the object-storage key.
    async fn render(&self, document: &InvoiceDocument) -> ClientResult<String>;
}
