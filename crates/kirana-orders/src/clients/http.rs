//! reqwest implementations of the collaborator traits.
//!
//! Each client carries its own base URL and deadline. A missed deadline
//! surfaces as [`ClientError::Timeout`]; callers decide whether that is a
//! hard failure (checkout initiate) or a degrade-to-stale (cart read).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    CatalogClient, ClientError, ClientResult, CouponValidation, GatewayOrder, GatewayPayment,
    GatewayRefund, InventoryClient, InvoiceDocument, InvoiceRenderer, NotificationClient,
    PaymentGatewayClient, PricingClient, ProductSummary, ShippingClient, ShippingQuote,
    VariantPrice, VariantSummary,
};
use crate::types::{AddressSnapshot, ShippingMethodSnapshot};

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub api_key: Option<String>,
}

impl HttpClientConfig {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[derive(Debug, Clone)]
struct BaseClient {
    http: reqwest::Client,
    config: HttpClientConfig,
}

impl BaseClient {
    fn new(config: HttpClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> ClientResult<Option<T>> {
        let mut request = self
            .http
            .get(self.url(path))
            .timeout(self.config.timeout);
        if let Some(key) = &self.config.api_key {
            request = request.header("X-Service-Key", key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(e, self.config.timeout))?;

        match response.status().as_u16() {
            404 => Ok(None),
            code if code >= 400 => Err(ClientError::Status(code)),
            _ => response
                .json::<T>()
                .await
                .map(Some)
                .map_err(|e| ClientError::from_reqwest(e, self.config.timeout)),
        }
    }

    async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        idempotency_key: Option<&str>,
    ) -> ClientResult<T> {
        let mut request = self
            .http
            .post(self.url(path))
            .timeout(self.config.timeout)
            .json(body);
        if let Some(key) = &self.config.api_key {
            request = request.header("X-Service-Key", key);
        }
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(e, self.config.timeout))?;

        let code = response.status().as_u16();
        if code >= 400 {
            return Err(ClientError::Status(code));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::from_reqwest(e, self.config.timeout))
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    base: BaseClient,
}

impl HttpCatalogClient {
    pub fn new(config: HttpClientConfig) -> Self {
        Self {
            base: BaseClient::new(config),
        }
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn product(&self, product_id: Uuid) -> ClientResult<Option<ProductSummary>> {
        self.base
            .get_json(&format!("/internal/products/{product_id}"))
            .await
    }

    async fn variant(&self, variant_id: Uuid) -> ClientResult<Option<VariantSummary>> {
        self.base
            .get_json(&format!("/internal/variants/{variant_id}"))
            .await
    }
}

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HttpPricingClient {
    base: BaseClient,
}

impl HttpPricingClient {
    pub fn new(config: HttpClientConfig) -> Self {
        Self {
            base: BaseClient::new(config),
        }
    }
}

#[derive(Serialize)]
struct BulkPriceRequest<'a> {
    variant_ids: &'a [Uuid],
}

#[derive(Deserialize)]
struct BulkPriceResponse {
    prices: Vec<VariantPrice>,
}

#[derive(Serialize)]
struct CouponRequest<'a> {
    code: &'a str,
    subtotal: Decimal,
    user_id: Option<Uuid>,
}

#[async_trait]
impl PricingClient for HttpPricingClient {
    async fn prices(&self, variant_ids: &[Uuid]) -> ClientResult<HashMap<Uuid, VariantPrice>> {
        let response: BulkPriceResponse = self
            .base
            .post_json("/internal/prices/bulk", &BulkPriceRequest { variant_ids }, None)
            .await?;
        Ok(response
            .prices
            .into_iter()
            .map(|price| (price.variant_id, price))
            .collect())
    }

    async fn validate_coupon(
        &self,
        code: &str,
        subtotal: Decimal,
        user_id: Option<Uuid>,
    ) -> ClientResult<CouponValidation> {
        self.base
            .post_json(
                "/internal/coupons/validate",
                &CouponRequest {
                    code,
                    subtotal,
                    user_id,
                },
                None,
            )
            .await
    }
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HttpInventoryClient {
    base: BaseClient,
}

impl HttpInventoryClient {
    pub fn new(config: HttpClientConfig) -> Self {
        Self {
            base: BaseClient::new(config),
        }
    }
}

#[derive(Serialize)]
struct ReserveRequest {
    variant_id: Uuid,
    quantity: i32,
    ttl_seconds: u64,
}

#[derive(Deserialize)]
struct ReserveResponse {
    token: String,
}

#[derive(Serialize)]
struct ReleaseRequest<'a> {
    tokens: &'a [String],
}

#[derive(Deserialize)]
struct ReleaseResponse {}

#[async_trait]
impl InventoryClient for HttpInventoryClient {
    async fn reserve_line(
        &self,
        variant_id: Uuid,
        quantity: i32,
        ttl: Duration,
    ) -> ClientResult<String> {
        let response: ReserveResponse = self
            .base
            .post_json(
                "/internal/reservations",
                &ReserveRequest {
                    variant_id,
                    quantity,
                    ttl_seconds: ttl.as_secs(),
                },
                None,
            )
            .await?;
        Ok(response.token)
    }

    async fn release(&self, tokens: &[String]) -> ClientResult<()> {
        if tokens.is_empty() {
            return Ok(());
        }
        let _: ReleaseResponse = self
            .base
            .post_json("/internal/reservations/release", &ReleaseRequest { tokens }, None)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Shipping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HttpShippingClient {
    base: BaseClient,
    /// Dev fallback: skip the courier API and quote a flat rate.
    bypass_rate: Option<Decimal>,
}

impl HttpShippingClient {
    pub fn new(config: HttpClientConfig) -> Self {
        Self {
            base: BaseClient::new(config),
            bypass_rate: None,
        }
    }

    pub fn with_bypass(mut self, flat_rate: Decimal) -> Self {
        self.bypass_rate = Some(flat_rate);
        self
    }
}

#[derive(Serialize)]
struct QuoteRequest<'a> {
    method_code: &'a str,
    pincode: &'a str,
    item_count: i32,
    subtotal: Decimal,
}

#[async_trait]
impl ShippingClient for HttpShippingClient {
    async fn quote(
        &self,
        method_code: &str,
        address: &AddressSnapshot,
        item_count: i32,
        subtotal: Decimal,
    ) -> ClientResult<ShippingQuote> {
        if let Some(rate) = self.bypass_rate {
            return Ok(ShippingQuote {
                serviceable: true,
                method: ShippingMethodSnapshot {
                    code: method_code.to_string(),
                    name: "Flat rate (bypass)".to_string(),
                    rate,
                    estimated_days: Some(5),
                },
            });
        }

        self.base
            .post_json(
                "/internal/shipping/quote",
                &QuoteRequest {
                    method_code,
                    pincode: &address.pincode,
                    item_count,
                    subtotal,
                },
                None,
            )
            .await
    }
}

// ---------------------------------------------------------------------------
// Payment gateway
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HttpPaymentGatewayClient {
    base: BaseClient,
}

impl HttpPaymentGatewayClient {
    pub fn new(config: HttpClientConfig) -> Self {
        Self {
            base: BaseClient::new(config),
        }
    }
}

#[derive(Serialize)]
struct CreateGatewayOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Serialize)]
struct CreateGatewayRefundRequest {
    amount: i64,
}

#[async_trait]
impl PaymentGatewayClient for HttpPaymentGatewayClient {
    async fn create_order(
        &self,
        amount_paise: i64,
        currency: &str,
        receipt: &str,
        idempotency_key: &str,
    ) -> ClientResult<GatewayOrder> {
        self.base
            .post_json(
                "/v1/orders",
                &CreateGatewayOrderRequest {
                    amount: amount_paise,
                    currency,
                    receipt,
                },
                Some(idempotency_key),
            )
            .await
    }

    async fn fetch_payment(&self, gateway_payment_id: &str) -> ClientResult<GatewayPayment> {
        self.base
            .get_json(&format!("/v1/payments/{gateway_payment_id}"))
            .await?
            .ok_or(ClientError::Status(404))
    }

    async fn create_refund(
        &self,
        gateway_payment_id: &str,
        amount_paise: i64,
        idempotency_key: &str,
    ) -> ClientResult<GatewayRefund> {
        self.base
            .post_json(
                &format!("/v1/payments/{gateway_payment_id}/refund"),
                &CreateGatewayRefundRequest {
                    amount: amount_paise,
                },
                Some(idempotency_key),
            )
            .await
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HttpNotificationClient {
    base: BaseClient,
}

impl HttpNotificationClient {
    pub fn new(config: HttpClientConfig) -> Self {
        Self {
            base: BaseClient::new(config),
        }
    }
}

#[derive(Serialize)]
struct CartReminderRequest {
    user_id: Uuid,
    cart_id: Uuid,
    sent_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct AckResponse {}

#[async_trait]
impl NotificationClient for HttpNotificationClient {
    async fn cart_reminder(&self, user_id: Uuid, cart_id: Uuid) -> ClientResult<()> {
        let _: AckResponse = self
            .base
            .post_json(
                "/internal/notifications/cart-reminder",
                &CartReminderRequest {
                    user_id,
                    cart_id,
                    sent_at: Utc::now(),
                },
                None,
            )
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Invoice renderer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HttpInvoiceRenderer {
    base: BaseClient,
}

impl HttpInvoiceRenderer {
    pub fn new(config: HttpClientConfig) -> Self {
        Self {
            base: BaseClient::new(config),
        }
    }
}

#[derive(Deserialize)]
struct RenderResponse {
    storage_key: String,
}

#[async_trait]
impl InvoiceRenderer for HttpInvoiceRenderer {
    async fn render(&self, document: &InvoiceDocument) -> ClientResult<String> {
        let response: RenderResponse = self
            .base
            .post_json("/internal/invoices/render", document, None)
            .await?;
        Ok(response.storage_key)
    }
}
