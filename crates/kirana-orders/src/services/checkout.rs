//! Checkout orchestration.
//!
//! A session freezes the cart for thirty minutes: revalidation, the
//! shipping quote, per-line inventory reservations, and the totals/items
//! snapshots all happen at initiation. `complete()` re-checks reality
//! against the snapshot (ε-bounded drift), creates the gateway order under
//! a stable idempotency key, and materializes the immutable order.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use tracing::instrument;
use uuid::Uuid;

use kirana_core::events::DomainEvent;
use kirana_core::money::{paise, round_money, CURRENCY_INR};
use kirana_core::generate_id;
use kirana_outbox::TransactionalEventBus;

use crate::clients::{CatalogClient, InventoryClient, PaymentGatewayClient, PricingClient, ShippingClient};
use crate::dto::checkout::{CheckoutCompletionResponse, InitiateCheckoutInput};
use crate::entities::checkout_session::CheckoutStatus;
use crate::entities::order::{FulfillmentStatus, OrderStatus};
use crate::entities::payment::PaymentStatus;
use crate::entities::status_history::HistoryKind;
use crate::entities::{cart, cart_item, checkout_session, order, order_item};
use crate::entities::cart::CartStatus;
use crate::error::{OrdersError, OrdersResult};
use crate::services::orders::{append_history, Actor};
use crate::services::revalidation::{RevalidationService, PRICE_EPSILON};
use crate::services::{sequence, CartService, EngineConfig, PaymentService};
use crate::types::{AddressSnapshot, AppliedCoupon, CustomerContact, ItemSnapshot, TotalsSnapshot};

pub struct CheckoutService {
    db: DatabaseConnection,
    events: TransactionalEventBus,
    revalidator: Arc<RevalidationService>,
    carts: Arc<CartService>,
    catalog: Arc<dyn CatalogClient>,
    pricing: Arc<dyn PricingClient>,
    shipping: Arc<dyn ShippingClient>,
    inventory: Arc<dyn InventoryClient>,
    gateway: Arc<dyn PaymentGatewayClient>,
    config: EngineConfig,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: DatabaseConnection,
        events: TransactionalEventBus,
        revalidator: Arc<RevalidationService>,
        carts: Arc<CartService>,
        catalog: Arc<dyn CatalogClient>,
        pricing: Arc<dyn PricingClient>,
        shipping: Arc<dyn ShippingClient>,
        inventory: Arc<dyn InventoryClient>,
        gateway: Arc<dyn PaymentGatewayClient>,
        config: EngineConfig,
    ) -> Self {
        Self {
            db,
            events,
            revalidator,
            carts,
            catalog,
            pricing,
            shipping,
            inventory,
            gateway,
            config,
        }
    }

    pub async fn get_owned(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> OrdersResult<checkout_session::Model> {
        let session = checkout_session::Entity::find_by_id(session_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| OrdersError::not_found("CheckoutSession", session_id))?;
        if session.user_id != user_id {
            return Err(OrdersError::not_found("CheckoutSession", session_id));
        }
        Ok(session)
    }

    /// Open a checkout session over the user's active cart.
    #[instrument(skip(self, input))]
    pub async fn initiate(
        &self,
        user_id: Uuid,
        input: InitiateCheckoutInput,
    ) -> OrdersResult<checkout_session::Model> {
        let cart = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .filter(cart::Column::Status.eq(CartStatus::Active))
            .filter(cart::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?
            .ok_or_else(|| OrdersError::not_found("Cart", "active"))?;

        let report = self.revalidator.revalidate_cart(cart.id).await?;
        if !report.unavailable.is_empty() {
            return Err(OrdersError::CartInvalid(format!(
                "{} item(s) are no longer available",
                report.unavailable.len()
            )));
        }

        let items = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .all(&self.db)
            .await?;
        if items.is_empty() {
            return Err(OrdersError::CartInvalid("cart is empty".to_string()));
        }

        // Coupons are re-derived here, not during cart mutations: a coupon
        // that stopped validating is dropped rather than blocking checkout.
        let cart = self.refresh_coupons(&cart, user_id).await?;

        let shipping_address: AddressSnapshot = input.shipping_address.into();
        let billing_address: AddressSnapshot = input
            .billing_address
            .map(Into::into)
            .unwrap_or_else(|| shipping_address.clone());

        let quote = self
            .shipping
            .quote(
                &input.shipping_method,
                &shipping_address,
                cart.item_count,
                cart.subtotal,
            )
            .await
            .map_err(|_| OrdersError::DownstreamUnavailable { service: "shipping" })?;
        if !quote.serviceable {
            return Err(OrdersError::validation(format!(
                "pincode {} is not serviceable",
                shipping_address.pincode
            )));
        }

        let items_snapshot = self.snapshot_items(&items).await?;
        let tax_total: Decimal = items_snapshot.iter().map(|line| line.line_tax).sum();
        let totals = TotalsSnapshot {
            subtotal: cart.subtotal,
            discount_total: cart.discount_total,
            shipping_total: round_money(quote.method.rate),
            tax_total: round_money(tax_total),
            grand_total: round_money(
                (cart.subtotal - cart.discount_total + quote.method.rate + tax_total)
                    .max(Decimal::ZERO),
            ),
            item_count: cart.item_count,
        };

        // All-or-nothing reservation: a failed line releases everything
        // already granted.
        let mut tokens: Vec<String> = Vec::with_capacity(items.len());
        for item in &items {
            match self
                .inventory
                .reserve_line(item.variant_id, item.quantity, self.config.reservation_ttl)
                .await
            {
                Ok(token) => tokens.push(token),
                Err(_) => {
                    if let Err(release_error) = self.inventory.release(&tokens).await {
                        tracing::warn!(%release_error, "partial reservation release failed");
                    }
                    return Err(OrdersError::StockUnavailable {
                        variant_id: item.variant_id,
                        requested: item.quantity,
                    });
                }
            }
        }

        let now = Utc::now();
        let expires_at = now
            + chrono::Duration::from_std(self.config.checkout_expiry)
                .unwrap_or_else(|_| chrono::Duration::minutes(30));

        let txn = self.db.begin().await?;
        let session = checkout_session::ActiveModel {
            id: Set(generate_id()),
            cart_id: Set(cart.id),
            user_id: Set(user_id),
            items_snapshot: Set(serde_json::to_value(&items_snapshot)?),
            shipping_address: Set(serde_json::to_value(&shipping_address)?),
            billing_address: Set(serde_json::to_value(&billing_address)?),
            shipping_method: Set(serde_json::to_value(&quote.method)?),
            payment_method: Set(input.payment_method),
            totals: Set(serde_json::to_value(&totals)?),
            reservation_tokens: Set(serde_json::to_value(&tokens)?),
            gateway_order_id: Set(None),
            order_id: Set(None),
            status: Set(CheckoutStatus::Initiated),
            expires_at: Set(expires_at),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let session = session.insert(&txn).await?;

        self.events
            .publish_in_tx(
                &txn,
                Some(user_id),
                DomainEvent::CheckoutStarted {
                    session_id: session.id,
                    cart_id: cart.id,
                    grand_total: totals.grand_total,
                },
            )
            .await?;
        txn.commit().await?;
        Ok(session)
    }

    /// Finish checkout: drift check, gateway order, order materialization.
    #[instrument(skip(self, contact))]
    pub async fn complete(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        contact: CustomerContact,
    ) -> OrdersResult<CheckoutCompletionResponse> {
        let session = self.get_owned(session_id, user_id).await?;

        if session.status.is_terminal() {
            return Err(OrdersError::invalid_state(format!(
                "session is {:?}",
                session.status
            )));
        }
        let now = Utc::now();
        if now >= session.expires_at {
            self.expire_session(&session).await?;
            return Err(OrdersError::CheckoutExpired);
        }

        let totals: TotalsSnapshot = serde_json::from_value(session.totals.clone())?;

        // Retried complete() after success: hand back the existing order.
        if let Some(order_id) = session.order_id {
            let existing = order::Entity::find_by_id(order_id)
                .one(&self.db)
                .await?
                .ok_or_else(|| OrdersError::not_found("Order", order_id))?;
            return Ok(CheckoutCompletionResponse {
                session_id,
                order_id,
                order_number: existing.order_number,
                gateway_order_id: session.gateway_order_id.clone().unwrap_or_default(),
                amount: totals.grand_total,
                currency: CURRENCY_INR.to_string(),
            });
        }

        // Re-derive the cart's grand total and compare against the frozen
        // snapshot; more than ε of drift aborts the hand-off.
        let cart = cart::Entity::find_by_id(session.cart_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| OrdersError::not_found("Cart", session.cart_id))?;
        self.revalidator.revalidate_cart(cart.id).await?;
        let cart = self.carts.recompute_in(&self.db, cart.id).await?;
        let recomputed_grand = round_money(
            (cart.subtotal - cart.discount_total + totals.shipping_total + totals.tax_total)
                .max(Decimal::ZERO),
        );
        if (recomputed_grand - totals.grand_total).abs() > PRICE_EPSILON {
            return Err(OrdersError::TotalsDrifted {
                expected: totals.grand_total,
                actual: recomputed_grand,
            });
        }

        // Stable idempotency key: a retried complete() returns the same
        // gateway order instead of opening a second one.
        let gateway_order_id = match &session.gateway_order_id {
            Some(existing) => existing.clone(),
            None => {
                let amount_paise = paise(totals.grand_total)
                    .ok_or_else(|| OrdersError::Internal("amount out of range".into()))?;
                let idempotency_key = format!(
                    "payment-{user_id}-{session_id}-{}",
                    session.created_at.timestamp()
                );
                let receipt = format!("session-{session_id}");
                let gateway_order = self
                    .gateway
                    .create_order(amount_paise, CURRENCY_INR, &receipt, &idempotency_key)
                    .await
                    .map_err(|_| OrdersError::GatewayUnavailable)?;
                gateway_order.id
            }
        };

        let items_snapshot: Vec<ItemSnapshot> =
            serde_json::from_value(session.items_snapshot.clone())?;
        let shipping_address: serde_json::Value = session.shipping_address.clone();
        let billing_address: serde_json::Value = session.billing_address.clone();

        let txn = self.db.begin().await?;
        let order_number = sequence::allocate(
            &txn,
            sequence::KIND_ORDER,
            now,
            self.config.tz_offset_minutes,
        )
        .await?;

        let order_id = generate_id();
        order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            user_id: Set(user_id),
            contact: Set(serde_json::to_value(&contact)?),
            shipping_address: Set(shipping_address),
            billing_address: Set(billing_address),
            totals: Set(session.totals.clone()),
            payment_method: Set(session.payment_method.clone()),
            status: Set(OrderStatus::Pending),
            payment_status: Set(PaymentStatus::Initiated),
            fulfillment_status: Set(FulfillmentStatus::Unfulfilled),
            cancel_reason: Set(None),
            tracking_number: Set(None),
            carrier: Set(None),
            shipped_at: Set(None),
            delivered_at: Set(None),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for line in &items_snapshot {
            order_item::ActiveModel {
                id: Set(generate_id()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                variant_id: Set(line.variant_id),
                bundle_id: Set(line.bundle_id),
                sku: Set(line.sku.clone()),
                name: Set(line.name.clone()),
                image_url: Set(line.image_url.clone()),
                hsn_code: Set(line.hsn_code.clone()),
                quantity: Set(line.quantity),
                quantity_fulfilled: Set(0),
                quantity_returned: Set(0),
                quantity_refunded: Set(0),
                unit_price: Set(line.unit_price),
                unit_mrp: Set(line.unit_mrp),
                line_discount: Set(line.line_discount),
                line_tax: Set(line.line_tax),
                line_total: Set(line.line_total),
                is_free_gift: Set(line.is_free_gift),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        PaymentService::insert_initiated(
            &txn,
            order_id,
            user_id,
            totals.grand_total,
            CURRENCY_INR,
            &gateway_order_id,
            &session.payment_method,
            serde_json::json!({}),
        )
        .await?;

        // Initial history: order pending, payment initiated, unfulfilled.
        append_history(&txn, order_id, HistoryKind::Order, "none", "pending", Actor::customer(user_id), None).await?;
        append_history(
            &txn,
            order_id,
            HistoryKind::Payment,
            "none",
            PaymentStatus::Initiated.as_str(),
            Actor::customer(user_id),
            None,
        )
        .await?;
        append_history(
            &txn,
            order_id,
            HistoryKind::Fulfillment,
            "none",
            FulfillmentStatus::Unfulfilled.as_str(),
            Actor::customer(user_id),
            None,
        )
        .await?;

        let mut cart_active: cart::ActiveModel = cart.into();
        cart_active.status = Set(CartStatus::Converted);
        cart_active.updated_at = Set(now);
        cart_active.update(&txn).await?;

        let mut session_active: checkout_session::ActiveModel = session.clone().into();
        session_active.status = Set(CheckoutStatus::PaymentPending);
        session_active.gateway_order_id = Set(Some(gateway_order_id.clone()));
        session_active.order_id = Set(Some(order_id));
        session_active.updated_at = Set(now);
        session_active.update(&txn).await?;

        self.events
            .publish_in_tx(
                &txn,
                Some(user_id),
                DomainEvent::OrderCreated {
                    order_id,
                    order_number: order_number.clone(),
                    user_id,
                    grand_total: totals.grand_total,
                },
            )
            .await?;
        txn.commit().await?;

        tracing::info!(
            order_id = %order_id,
            order_number = %order_number,
            "checkout completed, awaiting payment"
        );
        Ok(CheckoutCompletionResponse {
            session_id,
            order_id,
            order_number,
            gateway_order_id,
            amount: totals.grand_total,
            currency: CURRENCY_INR.to_string(),
        })
    }

    /// Flip stale sessions to expired and release their reservations. The
    /// cart stays active. Bounded per call.
    #[instrument(skip(self))]
    pub async fn expire_stale(&self, limit: u64) -> OrdersResult<usize> {
        let now = Utc::now();
        let stale = checkout_session::Entity::find()
            .filter(checkout_session::Column::ExpiresAt.lt(now))
            .filter(checkout_session::Column::Status.is_in([
                CheckoutStatus::Initiated,
                CheckoutStatus::AddressEntered,
                CheckoutStatus::PaymentPending,
            ]))
            .limit(limit)
            .all(&self.db)
            .await?;

        let count = stale.len();
        for session in stale {
            self.expire_session(&session).await?;
        }
        Ok(count)
    }

    async fn expire_session(&self, session: &checkout_session::Model) -> OrdersResult<()> {
        let tokens: Vec<String> =
            serde_json::from_value(session.reservation_tokens.clone()).unwrap_or_default();
        if !tokens.is_empty() {
            if let Err(error) = self.inventory.release(&tokens).await {
                tracing::warn!(session_id = %session.id, %error, "reservation release failed");
            }
        }

        let txn = self.db.begin().await?;
        let mut active: checkout_session::ActiveModel = session.clone().into();
        active.status = Set(CheckoutStatus::Expired);
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;
        self.events
            .publish_in_tx(
                &txn,
                None,
                DomainEvent::CheckoutExpired {
                    session_id: session.id,
                    cart_id: session.cart_id,
                },
            )
            .await?;
        txn.commit().await?;
        tracing::info!(session_id = %session.id, "checkout session expired");
        Ok(())
    }

    /// Re-validate cached coupons against the pricing collaborator; drop
    /// the ones that no longer hold and recompute totals.
    async fn refresh_coupons(&self, cart: &cart::Model, user_id: Uuid) -> OrdersResult<cart::Model> {
        let coupons: Vec<AppliedCoupon> =
            serde_json::from_value(cart.applied_coupons.clone()).unwrap_or_default();
        if coupons.is_empty() {
            return Ok(self.carts.recompute_in(&self.db, cart.id).await?);
        }

        let mut kept: Vec<AppliedCoupon> = Vec::with_capacity(coupons.len());
        for coupon in coupons {
            match self
                .pricing
                .validate_coupon(&coupon.code, cart.subtotal, Some(user_id))
                .await
            {
                Ok(validation) if validation.valid => {
                    kept.push(AppliedCoupon {
                        code: validation.code,
                        coupon_id: validation.coupon_id,
                        discount_amount: round_money(validation.discount_amount),
                        kind: validation.kind,
                    });
                }
                Ok(_) => {
                    tracing::info!(code = %coupon.code, "coupon no longer valid, dropped at checkout");
                }
                Err(_) => return Err(OrdersError::PricingUnavailable),
            }
        }

        let mut active: cart::ActiveModel = cart.clone().into();
        active.applied_coupons = Set(serde_json::to_value(&kept)?);
        active.update(&self.db).await?;
        Ok(self.carts.recompute_in(&self.db, cart.id).await?)
    }

    /// Assemble the order-facing item snapshot, enriching cart lines with
    /// catalog naming data.
    async fn snapshot_items(&self, items: &[cart_item::Model]) -> OrdersResult<Vec<ItemSnapshot>> {
        let mut products: HashMap<Uuid, crate::clients::ProductSummary> = HashMap::new();
        for item in items {
            if let std::collections::hash_map::Entry::Vacant(entry) = products.entry(item.product_id) {
                let summary = self
                    .catalog
                    .product(item.product_id)
                    .await
                    .map_err(|_| OrdersError::CatalogUnavailable)?
                    .ok_or_else(|| OrdersError::not_found("Product", item.product_id))?;
                entry.insert(summary);
            }
        }

        let mut snapshot = Vec::with_capacity(items.len());
        for item in items {
            let product = products
                .get(&item.product_id)
                .expect("populated above");
            let variant = self
                .catalog
                .variant(item.variant_id)
                .await
                .map_err(|_| OrdersError::CatalogUnavailable)?;
            snapshot.push(ItemSnapshot {
                product_id: item.product_id,
                variant_id: item.variant_id,
                bundle_id: item.bundle_id,
                sku: variant.and_then(|v| v.sku),
                name: product.name.clone(),
                image_url: product.image_url.clone(),
                hsn_code: product.hsn_code.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                unit_mrp: item.unit_mrp,
                line_discount: item.line_discount,
                line_tax: Decimal::ZERO,
                line_total: item.line_total,
                is_free_gift: item.is_free_gift,
            });
        }
        Ok(snapshot)
    }
}
