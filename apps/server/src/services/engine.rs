//! One-time wiring of the order engine: outbox-backed event bus, HTTP
//! collaborator clients, and the domain services, cached in the loco
//! shared store.

use std::sync::Arc;

use loco_rs::app::AppContext;
use loco_rs::Result;

use kirana_orders::clients::http::{
    HttpCatalogClient, HttpClientConfig, HttpInventoryClient, HttpInvoiceRenderer,
    HttpNotificationClient, HttpPaymentGatewayClient, HttpPricingClient, HttpShippingClient,
};
use kirana_orders::services::{
    CartService, CheckoutService, InvoiceService, OrderService, PaymentService, RefundService,
    ReturnService, RevalidationService,
};
use kirana_outbox::{OutboxTransport, TransactionalEventBus};
use rust_decimal::Decimal;

use crate::common::settings::KiranaSettings;

#[derive(Clone)]
pub struct Engine {
    pub settings: Arc<KiranaSettings>,
    pub revalidator: Arc<RevalidationService>,
    pub carts: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub refunds: Arc<RefundService>,
    pub returns: Arc<ReturnService>,
    pub invoices: Arc<InvoiceService>,
    pub notifications: Arc<dyn kirana_orders::clients::NotificationClient>,
}

/// Build (or fetch the cached) engine for this process.
pub fn engine_from_context(ctx: &AppContext) -> Result<Engine> {
    if let Some(engine) = ctx.shared_store.get::<Engine>() {
        return Ok(engine);
    }

    let settings = KiranaSettings::from_settings(&ctx.config.settings)
        .map_err(|error| loco_rs::Error::string(&format!("invalid kirana settings: {error}")))?;
    let config = settings.engine_config();

    let events = TransactionalEventBus::new(Arc::new(OutboxTransport::new(ctx.db.clone())));

    let catalog = Arc::new(HttpCatalogClient::new(HttpClientConfig::new(
        settings.collaborators.catalog.base_url.clone(),
        settings.collaborators.catalog.timeout(),
    )));
    let pricing = Arc::new(HttpPricingClient::new(HttpClientConfig::new(
        settings.collaborators.pricing.base_url.clone(),
        settings.collaborators.pricing.timeout(),
    )));
    let inventory = Arc::new(HttpInventoryClient::new(HttpClientConfig::new(
        settings.collaborators.inventory.base_url.clone(),
        settings.collaborators.inventory.timeout(),
    )));
    let mut shipping = HttpShippingClient::new(HttpClientConfig::new(
        settings.collaborators.shipping.base_url.clone(),
        settings.collaborators.shipping.timeout(),
    ));
    if settings.collaborators.shipping_bypass_mode {
        shipping = shipping.with_bypass(Decimal::from(50));
    }
    let shipping = Arc::new(shipping);
    let gateway = Arc::new(HttpPaymentGatewayClient::new(
        HttpClientConfig::new(
            settings.gateway.base_url.clone(),
            std::time::Duration::from_millis(settings.gateway.timeout_ms),
        )
        .with_api_key(settings.gateway.key_id.clone()),
    ));
    let notification = Arc::new(HttpNotificationClient::new(HttpClientConfig::new(
        settings.collaborators.notification.base_url.clone(),
        settings.collaborators.notification.timeout(),
    )));
    let renderer = Arc::new(HttpInvoiceRenderer::new(HttpClientConfig::new(
        settings.collaborators.invoice_renderer.base_url.clone(),
        settings.collaborators.invoice_renderer.timeout(),
    )));

    let revalidator = Arc::new(RevalidationService::new(
        ctx.db.clone(),
        catalog.clone(),
        pricing.clone(),
    ));
    let carts = Arc::new(CartService::new(
        ctx.db.clone(),
        events.clone(),
        catalog.clone(),
        pricing.clone(),
        config.clone(),
    ));
    let refunds = Arc::new(RefundService::new(
        ctx.db.clone(),
        events.clone(),
        gateway.clone(),
        config.clone(),
    ));
    let orders = Arc::new(OrderService::new(
        ctx.db.clone(),
        events.clone(),
        inventory.clone(),
        refunds.clone(),
        config.clone(),
    ));
    let payments = Arc::new(PaymentService::new(
        ctx.db.clone(),
        events.clone(),
        gateway.clone(),
        refunds.clone(),
        config.clone(),
    ));
    let returns = Arc::new(ReturnService::new(
        ctx.db.clone(),
        events.clone(),
        refunds.clone(),
        config.clone(),
    ));
    let invoices = Arc::new(InvoiceService::new(
        ctx.db.clone(),
        events.clone(),
        renderer,
        config.clone(),
    ));
    let checkout = Arc::new(CheckoutService::new(
        ctx.db.clone(),
        events,
        revalidator.clone(),
        carts.clone(),
        catalog,
        pricing,
        shipping,
        inventory,
        gateway,
        config,
    ));

    let engine = Engine {
        settings: Arc::new(settings),
        revalidator,
        carts,
        checkout,
        orders,
        payments,
        refunds,
        returns,
        invoices,
        notifications: notification,
    };
    ctx.shared_store.insert(engine.clone());
    Ok(engine)
}
