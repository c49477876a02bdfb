//! Scriptable mock collaborators.
//!
//! Each mock is `Arc`-cloneable and mutated through interior mutability so
//! a test can reshape the world (price changes, vanished variants, gateway
//! outages) between service calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use kirana_orders::clients::{
    CatalogClient, ClientError, ClientResult, CouponValidation, GatewayOrder, GatewayPayment,
    GatewayPaymentStatus, GatewayRefund, InventoryClient, InvoiceDocument, InvoiceRenderer,
    NotificationClient, PaymentGatewayClient, PricingClient, ProductLifecycle, ProductSummary,
    ShippingClient, ShippingQuote, VariantPrice, VariantSummary,
};
use kirana_orders::types::{AddressSnapshot, ShippingMethodSnapshot};

fn unavailable() -> ClientError {
    ClientError::Timeout(Duration::from_secs(3))
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockCatalogClient {
    products: Mutex<HashMap<Uuid, ProductSummary>>,
    variants: Mutex<HashMap<Uuid, VariantSummary>>,
    down: AtomicBool,
}

impl MockCatalogClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active product + variant pair and return their ids.
    pub fn seed_product(&self, name: &str) -> (Uuid, Uuid) {
        let product_id = Uuid::new_v4();
        let variant_id = Uuid::new_v4();
        self.products.lock().unwrap().insert(
            product_id,
            ProductSummary {
                id: product_id,
                name: name.to_string(),
                status: ProductLifecycle::Active,
                image_url: Some(format!("https://cdn.example/{name}.jpg")),
                hsn_code: Some("3004".to_string()),
            },
        );
        self.variants.lock().unwrap().insert(
            variant_id,
            VariantSummary {
                id: variant_id,
                product_id,
                sku: Some(format!("SKU-{}", &variant_id.simple().to_string()[..8])),
                active: true,
                max_per_order: None,
            },
        );
        (product_id, variant_id)
    }

    pub fn archive_product(&self, product_id: Uuid) {
        if let Some(product) = self.products.lock().unwrap().get_mut(&product_id) {
            product.status = ProductLifecycle::Archived;
        }
    }

    pub fn deactivate_variant(&self, variant_id: Uuid) {
        if let Some(variant) = self.variants.lock().unwrap().get_mut(&variant_id) {
            variant.active = false;
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl CatalogClient for MockCatalogClient {
    async fn product(&self, product_id: Uuid) -> ClientResult<Option<ProductSummary>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.products.lock().unwrap().get(&product_id).cloned())
    }

    async fn variant(&self, variant_id: Uuid) -> ClientResult<Option<VariantSummary>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.variants.lock().unwrap().get(&variant_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockPricingClient {
    prices: Mutex<HashMap<Uuid, VariantPrice>>,
    coupons: Mutex<HashMap<String, CouponValidation>>,
    down: AtomicBool,
}

impl MockPricingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, variant_id: Uuid, final_price: Decimal, mrp: Decimal) {
        self.prices.lock().unwrap().insert(
            variant_id,
            VariantPrice {
                variant_id,
                final_price,
                mrp,
                discount_percent: Decimal::ZERO,
            },
        );
    }

    pub fn seed_coupon(&self, code: &str, discount_amount: Decimal) {
        self.coupons.lock().unwrap().insert(
            code.to_string(),
            CouponValidation {
                coupon_id: Uuid::new_v4(),
                code: code.to_string(),
                kind: "flat".to_string(),
                discount_amount,
                valid: true,
                reason: None,
            },
        );
    }

    pub fn invalidate_coupon(&self, code: &str) {
        if let Some(coupon) = self.coupons.lock().unwrap().get_mut(code) {
            coupon.valid = false;
            coupon.reason = Some("coupon expired".to_string());
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl PricingClient for MockPricingClient {
    async fn prices(&self, variant_ids: &[Uuid]) -> ClientResult<HashMap<Uuid, VariantPrice>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let prices = self.prices.lock().unwrap();
        Ok(variant_ids
            .iter()
            .filter_map(|id| prices.get(id).cloned().map(|price| (*id, price)))
            .collect())
    }

    async fn validate_coupon(
        &self,
        code: &str,
        _subtotal: Decimal,
        _user_id: Option<Uuid>,
    ) -> ClientResult<CouponValidation> {
        if self.down.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self
            .coupons
            .lock()
            .unwrap()
            .get(code)
            .cloned()
            .unwrap_or(CouponValidation {
                coupon_id: Uuid::new_v4(),
                code: code.to_string(),
                kind: "flat".to_string(),
                discount_amount: Decimal::ZERO,
                valid: false,
                reason: Some("unknown coupon".to_string()),
            }))
    }
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockInventoryClient {
    out_of_stock: Mutex<Vec<Uuid>>,
    reserved: Mutex<Vec<String>>,
    released: Mutex<Vec<String>>,
    counter: AtomicU64,
}

impl MockInventoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_out_of_stock(&self, variant_id: Uuid) {
        self.out_of_stock.lock().unwrap().push(variant_id);
    }

    pub fn reserved_tokens(&self) -> Vec<String> {
        self.reserved.lock().unwrap().clone()
    }

    pub fn released_tokens(&self) -> Vec<String> {
        self.released.lock().unwrap().clone()
    }
}

#[async_trait]
impl InventoryClient for MockInventoryClient {
    async fn reserve_line(
        &self,
        variant_id: Uuid,
        _quantity: i32,
        _ttl: Duration,
    ) -> ClientResult<String> {
        if self.out_of_stock.lock().unwrap().contains(&variant_id) {
            return Err(ClientError::Status(409));
        }
        let token = format!("resv-{}", self.counter.fetch_add(1, Ordering::SeqCst));
        self.reserved.lock().unwrap().push(token.clone());
        Ok(token)
    }

    async fn release(&self, tokens: &[String]) -> ClientResult<()> {
        self.released.lock().unwrap().extend(tokens.iter().cloned());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Shipping
// ---------------------------------------------------------------------------

pub struct MockShippingClient {
    rate: Mutex<Decimal>,
    serviceable: AtomicBool,
}

impl Default for MockShippingClient {
    fn default() -> Self {
        Self {
            rate: Mutex::new(Decimal::from(50)),
            serviceable: AtomicBool::new(true),
        }
    }
}

impl MockShippingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rate(&self, rate: Decimal) {
        *self.rate.lock().unwrap() = rate;
    }

    pub fn set_serviceable(&self, serviceable: bool) {
        self.serviceable.store(serviceable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ShippingClient for MockShippingClient {
    async fn quote(
        &self,
        method_code: &str,
        _address: &AddressSnapshot,
        _item_count: i32,
        _subtotal: Decimal,
    ) -> ClientResult<ShippingQuote> {
        Ok(ShippingQuote {
            serviceable: self.serviceable.load(Ordering::SeqCst),
            method: ShippingMethodSnapshot {
                code: method_code.to_string(),
                name: "Standard".to_string(),
                rate: *self.rate.lock().unwrap(),
                estimated_days: Some(5),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Payment gateway
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockGatewayClient {
    orders: Mutex<HashMap<String, GatewayOrder>>,
    by_idempotency_key: Mutex<HashMap<String, String>>,
    payments: Mutex<HashMap<String, GatewayPayment>>,
    refunds: Mutex<Vec<GatewayRefund>>,
    counter: AtomicU64,
    down: AtomicBool,
}

impl MockGatewayClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Simulate the gateway capturing a payment against an order.
    pub fn settle_payment(&self, gateway_order_id: &str) -> String {
        let payment_id = format!("pay_{}", self.counter.fetch_add(1, Ordering::SeqCst));
        self.payments.lock().unwrap().insert(
            payment_id.clone(),
            GatewayPayment {
                id: payment_id.clone(),
                order_id: gateway_order_id.to_string(),
                status: GatewayPaymentStatus::Captured,
                amount: 0,
                captured_at: Some(Utc::now()),
            },
        );
        payment_id
    }

    pub fn set_payment_status(&self, gateway_payment_id: &str, status: GatewayPaymentStatus) {
        self.payments
            .lock()
            .unwrap()
            .entry(gateway_payment_id.to_string())
            .and_modify(|payment| payment.status = status)
            .or_insert(GatewayPayment {
                id: gateway_payment_id.to_string(),
                order_id: String::new(),
                status,
                amount: 0,
                captured_at: None,
            });
    }

    pub fn created_order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    pub fn refund_count(&self) -> usize {
        self.refunds.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGatewayClient for MockGatewayClient {
    async fn create_order(
        &self,
        amount_paise: i64,
        currency: &str,
        _receipt: &str,
        idempotency_key: &str,
    ) -> ClientResult<GatewayOrder> {
        if self.down.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        if let Some(existing_id) = self
            .by_idempotency_key
            .lock()
            .unwrap()
            .get(idempotency_key)
            .cloned()
        {
            return Ok(self.orders.lock().unwrap()[&existing_id].clone());
        }
        let id = format!("order_{}", self.counter.fetch_add(1, Ordering::SeqCst));
        let order = GatewayOrder {
            id: id.clone(),
            amount: amount_paise,
            currency: currency.to_string(),
            status: "created".to_string(),
        };
        self.orders.lock().unwrap().insert(id.clone(), order.clone());
        self.by_idempotency_key
            .lock()
            .unwrap()
            .insert(idempotency_key.to_string(), id);
        Ok(order)
    }

    async fn fetch_payment(&self, gateway_payment_id: &str) -> ClientResult<GatewayPayment> {
        if self.down.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.payments
            .lock()
            .unwrap()
            .get(gateway_payment_id)
            .cloned()
            .ok_or(ClientError::Status(404))
    }

    async fn create_refund(
        &self,
        _gateway_payment_id: &str,
        _amount_paise: i64,
        _idempotency_key: &str,
    ) -> ClientResult<GatewayRefund> {
        if self.down.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let refund = GatewayRefund {
            id: format!("rfnd_{}", self.counter.fetch_add(1, Ordering::SeqCst)),
            status: "processed".to_string(),
        };
        self.refunds.lock().unwrap().push(refund.clone());
        Ok(refund)
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockNotificationClient {
    reminders: Mutex<Vec<(Uuid, Uuid)>>,
}

impl MockNotificationClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reminder_count(&self) -> usize {
        self.reminders.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationClient for MockNotificationClient {
    async fn cart_reminder(&self, user_id: Uuid, cart_id: Uuid) -> ClientResult<()> {
        self.reminders.lock().unwrap().push((user_id, cart_id));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Invoice renderer
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockInvoiceRenderer {
    rendered: Mutex<Vec<String>>,
}

impl MockInvoiceRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rendered_count(&self) -> usize {
        self.rendered.lock().unwrap().len()
    }
}

#[async_trait]
impl InvoiceRenderer for MockInvoiceRenderer {
    async fn render(&self, document: &InvoiceDocument) -> ClientResult<String> {
        let key = format!("invoices/{}.pdf", document.invoice_number);
        self.rendered.lock().unwrap().push(key.clone());
        Ok(key)
    }
}
