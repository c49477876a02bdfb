//! Shared harness: a full engine over in-memory sqlite with scriptable
//! mock collaborators.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

use kirana_core::events::MemoryTransport;
use kirana_orders::dto::cart::{AddItemInput, CartOwner};
use kirana_orders::dto::checkout::{AddressInput, CheckoutCompletionResponse, InitiateCheckoutInput};
use kirana_orders::entities::order;
use kirana_orders::services::{
    CartService, CheckoutService, EngineConfig, InvoiceService, OrderService, PaymentService,
    RefundService, ReturnService, RevalidationService,
};
use kirana_orders::signature;
use kirana_orders::types::CustomerContact;
use kirana_test_utils::{
    recording_event_bus, setup_test_db, MockCatalogClient, MockGatewayClient, MockInventoryClient,
    MockInvoiceRenderer, MockNotificationClient, MockPricingClient, MockShippingClient,
};

pub const GATEWAY_SECRET: &str = "test-gateway-secret";
pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

pub struct TestEnv {
    pub db: DatabaseConnection,
    pub transport: Arc<MemoryTransport>,
    pub catalog: Arc<MockCatalogClient>,
    pub pricing: Arc<MockPricingClient>,
    pub inventory: Arc<MockInventoryClient>,
    pub shipping: Arc<MockShippingClient>,
    pub gateway: Arc<MockGatewayClient>,
    pub notifications: Arc<MockNotificationClient>,
    pub renderer: Arc<MockInvoiceRenderer>,
    pub revalidator: Arc<RevalidationService>,
    pub carts: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub refunds: Arc<RefundService>,
    pub returns: Arc<ReturnService>,
    pub invoices: Arc<InvoiceService>,
    pub config: EngineConfig,
}

pub async fn setup() -> TestEnv {
    let db = setup_test_db().await;
    let (events, transport) = recording_event_bus();

    let config = EngineConfig {
        gateway_secret: GATEWAY_SECRET.to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
        // UTC keeps date assertions in tests timezone-independent.
        tz_offset_minutes: 0,
        ..EngineConfig::default()
    };

    let catalog = Arc::new(MockCatalogClient::new());
    let pricing = Arc::new(MockPricingClient::new());
    let inventory = Arc::new(MockInventoryClient::new());
    let shipping = Arc::new(MockShippingClient::new());
    let gateway = Arc::new(MockGatewayClient::new());
    let notifications = Arc::new(MockNotificationClient::new());
    let renderer = Arc::new(MockInvoiceRenderer::new());

    let revalidator = Arc::new(RevalidationService::new(
        db.clone(),
        catalog.clone(),
        pricing.clone(),
    ));
    let carts = Arc::new(CartService::new(
        db.clone(),
        events.clone(),
        catalog.clone(),
        pricing.clone(),
        config.clone(),
    ));
    let refunds = Arc::new(RefundService::new(
        db.clone(),
        events.clone(),
        gateway.clone(),
        config.clone(),
    ));
    let orders = Arc::new(OrderService::new(
        db.clone(),
        events.clone(),
        inventory.clone(),
        refunds.clone(),
        config.clone(),
    ));
    let payments = Arc::new(PaymentService::new(
        db.clone(),
        events.clone(),
        gateway.clone(),
        refunds.clone(),
        config.clone(),
    ));
    let returns = Arc::new(ReturnService::new(
        db.clone(),
        events.clone(),
        refunds.clone(),
        config.clone(),
    ));
    let invoices = Arc::new(InvoiceService::new(
        db.clone(),
        events.clone(),
        renderer.clone(),
        config.clone(),
    ));
    let checkout = Arc::new(CheckoutService::new(
        db.clone(),
        events,
        revalidator.clone(),
        carts.clone(),
        catalog.clone(),
        pricing.clone(),
        shipping.clone(),
        inventory.clone(),
        gateway.clone(),
        config.clone(),
    ));

    TestEnv {
        db,
        transport,
        catalog,
        pricing,
        inventory,
        shipping,
        gateway,
        notifications,
        renderer,
        revalidator,
        carts,
        checkout,
        orders,
        payments,
        refunds,
        returns,
        invoices,
        config,
    }
}

impl TestEnv {
    /// Seed a product priced at `price` and return (product, variant).
    pub fn seed_variant(&self, name: &str, price: Decimal) -> (Uuid, Uuid) {
        let (product_id, variant_id) = self.catalog.seed_product(name);
        self.pricing.set_price(variant_id, price, price);
        (product_id, variant_id)
    }

    pub async fn add_to_cart(
        &self,
        owner: &CartOwner,
        product_id: Uuid,
        variant_id: Uuid,
        quantity: i32,
    ) {
        self.carts
            .add_item(
                owner,
                AddItemInput {
                    product_id,
                    variant_id,
                    bundle_id: None,
                    quantity,
                },
            )
            .await
            .expect("add item");
    }

    /// Cart → checkout → complete for the given user. Returns the hand-off.
    pub async fn checkout_user(&self, user_id: Uuid) -> CheckoutCompletionResponse {
        let session = self
            .checkout
            .initiate(user_id, checkout_input())
            .await
            .expect("initiate checkout");
        self.checkout
            .complete(user_id, session.id, contact())
            .await
            .expect("complete checkout")
    }

    /// Simulate the gateway capturing the payment via webhook.
    pub async fn capture_via_webhook(&self, gateway_order_id: &str) -> String {
        let gateway_payment_id = self.gateway.settle_payment(gateway_order_id);
        let body = serde_json::json!({
            "event": "payment.captured",
            "gateway_payment_id": gateway_payment_id,
            "gateway_order_id": gateway_order_id,
        })
        .to_string();
        let sig = signature::sign_webhook(body.as_bytes(), WEBHOOK_SECRET);
        self.payments
            .handle_webhook(body.as_bytes(), &sig)
            .await
            .expect("webhook processed");
        gateway_payment_id
    }

    /// Full path to a delivered, paid order with `quantity` units of a
    /// fresh variant at `price`.
    pub async fn delivered_order(
        &self,
        user_id: Uuid,
        price: Decimal,
        quantity: i32,
    ) -> CheckoutCompletionResponse {
        let (product_id, variant_id) = self.seed_variant("Delivered goods", price);
        let owner = CartOwner::User(user_id);
        self.add_to_cart(&owner, product_id, variant_id, quantity).await;
        let completion = self.checkout_user(user_id).await;
        self.capture_via_webhook(&completion.gateway_order_id).await;
        self.deliver_order(completion.order_id).await;
        completion
    }

    /// Drive an order along the forward path to delivered.
    pub async fn deliver_order(&self, order_id: Uuid) {
        use kirana_orders::entities::order::OrderStatus::*;
        use kirana_orders::services::orders::TransitionExtras;
        use kirana_orders::services::Actor;

        let admin = Actor::admin(Uuid::new_v4());
        self.orders
            .transition(order_id, Confirmed, admin, false, TransitionExtras::default())
            .await
            .expect("confirm");
        self.orders
            .transition(order_id, Processing, admin, false, TransitionExtras::default())
            .await
            .expect("process");
        self.orders
            .transition(
                order_id,
                Shipped,
                admin,
                false,
                TransitionExtras {
                    tracking_number: Some("TRK123".to_string()),
                    carrier: Some("BlueDart".to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("ship");
        self.orders
            .transition(order_id, OutForDelivery, admin, false, TransitionExtras::default())
            .await
            .expect("out for delivery");
        self.orders
            .transition(order_id, Delivered, admin, false, TransitionExtras::default())
            .await
            .expect("deliver");
    }

    /// Rewrite an order's delivered_at, for window-boundary tests.
    pub async fn backdate_delivery(&self, order_id: Uuid, delivered_at: chrono::DateTime<Utc>) {
        let row = order::Entity::find_by_id(order_id)
            .one(&self.db)
            .await
            .unwrap()
            .unwrap();
        let mut active: order::ActiveModel = row.into();
        active.delivered_at = Set(Some(delivered_at));
        active.update(&self.db).await.unwrap();
    }
}

pub fn contact() -> CustomerContact {
    CustomerContact {
        name: "Asha Sharma".to_string(),
        email: "asha@example.com".to_string(),
        phone: "+919876543210".to_string(),
    }
}

pub fn address_input() -> AddressInput {
    AddressInput {
        full_name: "Asha Sharma".to_string(),
        phone: "+919876543210".to_string(),
        line1: "14 MG Road".to_string(),
        line2: None,
        landmark: None,
        city: "Bengaluru".to_string(),
        state: "Karnataka".to_string(),
        pincode: "560001".to_string(),
        country: "IN".to_string(),
    }
}

pub fn checkout_input() -> InitiateCheckoutInput {
    InitiateCheckoutInput {
        shipping_address: address_input(),
        billing_address: None,
        shipping_method: "standard".to_string(),
        payment_method: "upi".to_string(),
    }
}

pub fn rupees(value: i64) -> Decimal {
    Decimal::from(value)
}

pub fn flat_fifty() -> Decimal {
    dec!(50.00)
}
