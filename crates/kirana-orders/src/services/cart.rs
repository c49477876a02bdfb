//! Cart and merge management.
//!
//! Totals are recomputed after every mutation and always satisfy
//! `item_count = Σ quantity`, `subtotal = Σ line_total`,
//! `grand_total = max(0, subtotal - discount_total + shipping_total + tax_total)`.
//! The guest→user merge is the only mutation spanning two carts; it runs in
//! one transaction under a per-user mutex so a concurrent or repeated merge
//! observes either the untouched pair or the finished result.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

use kirana_core::events::DomainEvent;
use kirana_core::money::round_money;
use kirana_core::generate_id;
use kirana_outbox::TransactionalEventBus;

use crate::clients::{CatalogClient, PricingClient, ProductLifecycle};
use crate::dto::cart::{AddItemInput, CartOwner};
use crate::entities::{cart, cart_item};
use crate::entities::cart::CartStatus;
use crate::error::{OrdersError, OrdersResult};
use crate::services::revalidation::compute_line_total;
use crate::services::EngineConfig;
use crate::types::{AppliedCoupon, PriceSnapshot};

pub struct CartService {
    db: DatabaseConnection,
    events: TransactionalEventBus,
    catalog: Arc<dyn CatalogClient>,
    pricing: Arc<dyn PricingClient>,
    config: EngineConfig,
    merge_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl CartService {
    pub fn new(
        db: DatabaseConnection,
        events: TransactionalEventBus,
        catalog: Arc<dyn CatalogClient>,
        pricing: Arc<dyn PricingClient>,
        config: EngineConfig,
    ) -> Self {
        Self {
            db,
            events,
            catalog,
            pricing,
            config,
            merge_locks: Mutex::new(HashMap::new()),
        }
    }

    fn active_cart_query(owner: &CartOwner) -> sea_orm::Select<cart::Entity> {
        let query = cart::Entity::find()
            .filter(cart::Column::Status.eq(CartStatus::Active))
            .filter(cart::Column::DeletedAt.is_null());
        match owner {
            CartOwner::User(user_id) => query.filter(cart::Column::UserId.eq(*user_id)),
            CartOwner::Guest(session_id) => {
                query.filter(cart::Column::SessionId.eq(session_id.clone()))
            }
        }
    }

    pub async fn find_active_cart(&self, owner: &CartOwner) -> OrdersResult<Option<cart::Model>> {
        Ok(Self::active_cart_query(owner).one(&self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn get_or_create_cart(&self, owner: &CartOwner) -> OrdersResult<cart::Model> {
        if let Some(existing) = self.find_active_cart(owner).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let (user_id, session_id) = match owner {
            CartOwner::User(user_id) => (Some(*user_id), None),
            CartOwner::Guest(session_id) => (None, Some(session_id.clone())),
        };
        let model = cart::ActiveModel {
            id: Set(generate_id()),
            user_id: Set(user_id),
            session_id: Set(session_id),
            status: Set(CartStatus::Active),
            subtotal: Set(Decimal::ZERO),
            discount_total: Set(Decimal::ZERO),
            shipping_total: Set(Decimal::ZERO),
            tax_total: Set(Decimal::ZERO),
            grand_total: Set(Decimal::ZERO),
            item_count: Set(0),
            applied_coupons: Set(serde_json::json!([])),
            reminder_sent: Set(false),
            reminder_sent_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        };
        Ok(model.insert(&self.db).await?)
    }

    pub async fn items_of(&self, cart_id: Uuid) -> OrdersResult<Vec<cart_item::Model>> {
        Ok(cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// Add a variant to the owner's cart, coalescing into an existing line
    /// when (variant, bundle) already sits in it.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        owner: &CartOwner,
        input: AddItemInput,
    ) -> OrdersResult<cart::Model> {
        let cart = self.get_or_create_cart(owner).await?;

        let variant = self
            .catalog
            .variant(input.variant_id)
            .await
            .map_err(|_| OrdersError::CatalogUnavailable)?
            .ok_or_else(|| OrdersError::not_found("Variant", input.variant_id))?;
        if !variant.active {
            return Err(OrdersError::validation("variant is not available"));
        }
        let product = self
            .catalog
            .product(input.product_id)
            .await
            .map_err(|_| OrdersError::CatalogUnavailable)?
            .ok_or_else(|| OrdersError::not_found("Product", input.product_id))?;
        if product.status != ProductLifecycle::Active {
            return Err(OrdersError::validation("product is not available"));
        }

        let line_cap = variant
            .max_per_order
            .unwrap_or(self.config.max_quantity_per_line)
            .min(self.config.max_quantity_per_line);

        let existing = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::VariantId.eq(input.variant_id))
            .filter(match input.bundle_id {
                Some(bundle_id) => cart_item::Column::BundleId.eq(bundle_id),
                None => cart_item::Column::BundleId.is_null(),
            })
            .one(&self.db)
            .await?;

        let now = Utc::now();
        let txn = self.db.begin().await?;

        match existing {
            Some(item) => {
                let quantity = item.quantity + input.quantity;
                if quantity > line_cap {
                    return Err(OrdersError::validation(format!(
                        "at most {line_cap} of this item per order"
                    )));
                }
                let mut active: cart_item::ActiveModel = item.clone().into();
                active.quantity = Set(quantity);
                active.line_total =
                    Set(compute_line_total(quantity, item.unit_price, item.line_discount));
                active.updated_at = Set(now);
                active.update(&txn).await?;
            }
            None => {
                let line_count = self.items_of(cart.id).await?.len();
                if line_count >= self.config.max_items_per_cart {
                    return Err(OrdersError::validation(format!(
                        "cart holds at most {} items",
                        self.config.max_items_per_cart
                    )));
                }
                if input.quantity > line_cap {
                    return Err(OrdersError::validation(format!(
                        "at most {line_cap} of this item per order"
                    )));
                }

                let prices = self
                    .pricing
                    .prices(&[input.variant_id])
                    .await
                    .map_err(|_| OrdersError::PricingUnavailable)?;
                let price = prices
                    .get(&input.variant_id)
                    .ok_or_else(|| OrdersError::validation("variant has no price"))?;

                let unit_price = round_money(price.final_price);
                let unit_mrp = round_money(price.mrp);
                let snapshot = PriceSnapshot {
                    unit_price,
                    unit_mrp,
                    captured_at: now,
                    discount_percent: price.discount_percent,
                };
                let model = cart_item::ActiveModel {
                    id: Set(generate_id()),
                    cart_id: Set(cart.id),
                    product_id: Set(input.product_id),
                    variant_id: Set(input.variant_id),
                    bundle_id: Set(input.bundle_id),
                    quantity: Set(input.quantity),
                    unit_price: Set(unit_price),
                    unit_mrp: Set(unit_mrp),
                    line_discount: Set(Decimal::ZERO),
                    line_total: Set(compute_line_total(input.quantity, unit_price, Decimal::ZERO)),
                    is_free_gift: Set(false),
                    price_snapshot: Set(serde_json::to_value(snapshot)?),
                    product_exists: Set(true),
                    variant_exists: Set(true),
                    last_checked_at: Set(Some(now)),
                    price_changed: Set(false),
                    old_price: Set(None),
                    new_price: Set(None),
                    price_changed_at: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                model.insert(&txn).await?;
            }
        }

        let updated = self.recompute_in(&txn, cart.id).await?;
        self.events
            .publish_in_tx(
                &txn,
                None,
                DomainEvent::CartUpdated {
                    cart_id: updated.id,
                    item_count: updated.item_count,
                    grand_total: updated.grand_total,
                },
            )
            .await?;
        txn.commit().await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        owner: &CartOwner,
        item_id: Uuid,
        quantity: i32,
    ) -> OrdersResult<cart::Model> {
        let cart = self.owned_active_cart(owner).await?;
        let item = self.owned_item(&cart, item_id).await?;

        if quantity > self.config.max_quantity_per_line {
            return Err(OrdersError::validation(format!(
                "at most {} of this item per order",
                self.config.max_quantity_per_line
            )));
        }

        let txn = self.db.begin().await?;
        let mut active: cart_item::ActiveModel = item.clone().into();
        active.quantity = Set(quantity);
        active.line_total = Set(compute_line_total(quantity, item.unit_price, item.line_discount));
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        let updated = self.recompute_in(&txn, cart.id).await?;
        txn.commit().await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, owner: &CartOwner, item_id: Uuid) -> OrdersResult<cart::Model> {
        let cart = self.owned_active_cart(owner).await?;
        let item = self.owned_item(&cart, item_id).await?;

        let txn = self.db.begin().await?;
        cart_item::Entity::delete_by_id(item.id).exec(&txn).await?;
        let updated = self.recompute_in(&txn, cart.id).await?;
        txn.commit().await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn clear(&self, owner: &CartOwner) -> OrdersResult<cart::Model> {
        let cart = self.owned_active_cart(owner).await?;
        let txn = self.db.begin().await?;
        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;
        let mut cart_active: cart::ActiveModel = cart.clone().into();
        cart_active.applied_coupons = Set(serde_json::json!([]));
        cart_active.update(&txn).await?;
        let updated = self.recompute_in(&txn, cart.id).await?;
        txn.commit().await?;
        Ok(updated)
    }

    /// Validate a coupon against the pricing collaborator and cache its
    /// discount on the cart. The cached amount is trusted until checkout
    /// entry re-derives it.
    #[instrument(skip(self))]
    pub async fn apply_coupon(&self, owner: &CartOwner, code: &str) -> OrdersResult<cart::Model> {
        let cart = self.owned_active_cart(owner).await?;
        let mut coupons: Vec<AppliedCoupon> =
            serde_json::from_value(cart.applied_coupons.clone()).unwrap_or_default();
        if coupons.iter().any(|coupon| coupon.code == code) {
            return Err(OrdersError::Conflict(format!("coupon {code} already applied")));
        }

        let user_id = cart.user_id;
        let validation = self
            .pricing
            .validate_coupon(code, cart.subtotal, user_id)
            .await
            .map_err(|_| OrdersError::PricingUnavailable)?;
        if !validation.valid {
            return Err(OrdersError::validation(
                validation
                    .reason
                    .unwrap_or_else(|| format!("coupon {code} is not valid")),
            ));
        }

        coupons.push(AppliedCoupon {
            code: validation.code,
            coupon_id: validation.coupon_id,
            discount_amount: round_money(validation.discount_amount),
            kind: validation.kind,
        });

        let txn = self.db.begin().await?;
        let mut active: cart::ActiveModel = cart.clone().into();
        active.applied_coupons = Set(serde_json::to_value(coupons)?);
        active.update(&txn).await?;
        let updated = self.recompute_in(&txn, cart.id).await?;
        txn.commit().await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn remove_coupon(&self, owner: &CartOwner, code: &str) -> OrdersResult<cart::Model> {
        let cart = self.owned_active_cart(owner).await?;
        let mut coupons: Vec<AppliedCoupon> =
            serde_json::from_value(cart.applied_coupons.clone()).unwrap_or_default();
        let before = coupons.len();
        coupons.retain(|coupon| coupon.code != code);
        if coupons.len() == before {
            return Err(OrdersError::not_found("Coupon", code));
        }

        let txn = self.db.begin().await?;
        let mut active: cart::ActiveModel = cart.clone().into();
        active.applied_coupons = Set(serde_json::to_value(coupons)?);
        active.update(&txn).await?;
        let updated = self.recompute_in(&txn, cart.id).await?;
        txn.commit().await?;
        Ok(updated)
    }

    /// Merge the guest cart into the user's. Scenario 1: no guest cart →
    /// no-op. Scenario 2: no user cart → re-parent. Scenario 3: coalesce
    /// by (variant, bundle), the newer price snapshot winning.
    #[instrument(skip(self))]
    pub async fn merge_guest_into_user(
        &self,
        guest_session_id: &str,
        user_id: Uuid,
    ) -> OrdersResult<Option<cart::Model>> {
        let lock = {
            let mut locks = self.merge_locks.lock().await;
            locks
                .entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = lock.lock().await;

        let guest_owner = CartOwner::Guest(guest_session_id.to_string());
        let Some(guest_cart) = self.find_active_cart(&guest_owner).await? else {
            return Ok(None);
        };

        let user_owner = CartOwner::User(user_id);
        let user_cart = self.find_active_cart(&user_owner).await?;
        let now = Utc::now();

        let txn = self.db.begin().await?;
        let merged = match user_cart {
            None => {
                let mut active: cart::ActiveModel = guest_cart.clone().into();
                active.user_id = Set(Some(user_id));
                active.session_id = Set(None);
                active.updated_at = Set(now);
                active.update(&txn).await?
            }
            Some(user_cart) => {
                let user_items = cart_item::Entity::find()
                    .filter(cart_item::Column::CartId.eq(user_cart.id))
                    .all(&txn)
                    .await?;
                let guest_items = cart_item::Entity::find()
                    .filter(cart_item::Column::CartId.eq(guest_cart.id))
                    .all(&txn)
                    .await?;

                let mut by_key: HashMap<(Uuid, Option<Uuid>), cart_item::Model> = user_items
                    .into_iter()
                    .map(|item| ((item.variant_id, item.bundle_id), item))
                    .collect();

                for guest_item in guest_items {
                    let key = (guest_item.variant_id, guest_item.bundle_id);
                    match by_key.remove(&key) {
                        Some(user_item) => {
                            let combined = user_item.quantity + guest_item.quantity;
                            let guest_snapshot = snapshot_captured_at(&guest_item);
                            let user_snapshot = snapshot_captured_at(&user_item);
                            let guest_is_newer = guest_snapshot > user_snapshot;

                            let mut active: cart_item::ActiveModel = user_item.clone().into();
                            active.quantity = Set(combined);
                            if guest_is_newer {
                                active.unit_price = Set(guest_item.unit_price);
                                active.unit_mrp = Set(guest_item.unit_mrp);
                                active.line_discount = Set(guest_item.line_discount);
                                active.price_snapshot = Set(guest_item.price_snapshot.clone());
                                active.product_exists = Set(guest_item.product_exists);
                                active.variant_exists = Set(guest_item.variant_exists);
                                active.last_checked_at = Set(guest_item.last_checked_at);
                            }
                            let (unit_price, line_discount) = if guest_is_newer {
                                (guest_item.unit_price, guest_item.line_discount)
                            } else {
                                (user_item.unit_price, user_item.line_discount)
                            };
                            active.line_total =
                                Set(compute_line_total(combined, unit_price, line_discount));
                            active.updated_at = Set(now);
                            active.update(&txn).await?;

                            cart_item::Entity::delete_by_id(guest_item.id)
                                .exec(&txn)
                                .await?;
                        }
                        None => {
                            let mut active: cart_item::ActiveModel = guest_item.into();
                            active.cart_id = Set(user_cart.id);
                            active.updated_at = Set(now);
                            active.update(&txn).await?;
                        }
                    }
                }

                cart::Entity::delete_by_id(guest_cart.id).exec(&txn).await?;
                self.recompute_in(&txn, user_cart.id).await?
            }
        };

        self.events
            .publish_in_tx(
                &txn,
                Some(user_id),
                DomainEvent::CartMerged {
                    guest_cart_id: guest_cart.id,
                    user_cart_id: merged.id,
                    user_id,
                },
            )
            .await?;
        txn.commit().await?;

        tracing::info!(
            guest_cart_id = %guest_cart.id,
            user_cart_id = %merged.id,
            "guest cart merged"
        );
        Ok(Some(merged))
    }

    pub async fn recompute(&self, cart_id: Uuid) -> OrdersResult<cart::Model> {
        self.recompute_in(&self.db, cart_id).await
    }

    /// Recompute and persist cart totals from its lines and cached coupons.
    pub async fn recompute_in<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        cart_id: Uuid,
    ) -> OrdersResult<cart::Model> {
        let cart = cart::Entity::find_by_id(cart_id)
            .one(conn)
            .await?
            .ok_or_else(|| OrdersError::not_found("Cart", cart_id))?;
        let items = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .all(conn)
            .await?;

        let subtotal: Decimal = items.iter().map(|item| item.line_total).sum();
        let item_count: i32 = items.iter().map(|item| item.quantity).sum();
        let coupons: Vec<AppliedCoupon> =
            serde_json::from_value(cart.applied_coupons.clone()).unwrap_or_default();
        let discount_total: Decimal = coupons.iter().map(|coupon| coupon.discount_amount).sum();

        let grand_total = round_money(
            (subtotal - discount_total + cart.shipping_total + cart.tax_total).max(Decimal::ZERO),
        );

        let mut active: cart::ActiveModel = cart.into();
        active.subtotal = Set(round_money(subtotal));
        active.discount_total = Set(round_money(discount_total));
        active.grand_total = Set(grand_total);
        active.item_count = Set(item_count);
        active.updated_at = Set(Utc::now());
        Ok(active.update(conn).await?)
    }

    /// Flip long-idle active carts to abandoned. Bounded per call.
    pub async fn mark_abandoned(&self, idle_days: i64, limit: u64) -> OrdersResult<usize> {
        use sea_orm::QuerySelect;
        let cutoff = Utc::now() - ChronoDuration::days(idle_days);
        let stale = cart::Entity::find()
            .filter(cart::Column::Status.eq(CartStatus::Active))
            .filter(cart::Column::UpdatedAt.lt(cutoff))
            .limit(limit)
            .all(&self.db)
            .await?;
        let count = stale.len();
        for cart_model in stale {
            let mut active: cart::ActiveModel = cart_model.into();
            active.status = Set(CartStatus::Abandoned);
            active.updated_at = Set(Utc::now());
            active.update(&self.db).await?;
        }
        Ok(count)
    }

    /// Hard-delete abandoned carts older than the retention window,
    /// cascading to their items.
    pub async fn purge_abandoned(&self, older_than_days: i64, limit: u64) -> OrdersResult<usize> {
        use sea_orm::QuerySelect;
        let cutoff = Utc::now() - ChronoDuration::days(older_than_days);
        let dead = cart::Entity::find()
            .filter(cart::Column::Status.eq(CartStatus::Abandoned))
            .filter(cart::Column::UpdatedAt.lt(cutoff))
            .limit(limit)
            .all(&self.db)
            .await?;
        let count = dead.len();
        let txn = self.db.begin().await?;
        for cart_model in dead {
            cart_item::Entity::delete_many()
                .filter(cart_item::Column::CartId.eq(cart_model.id))
                .exec(&txn)
                .await?;
            cart::Entity::delete_by_id(cart_model.id).exec(&txn).await?;
        }
        txn.commit().await?;
        Ok(count)
    }

    /// Carts eligible for the abandoned-cart reminder: idle inside the
    /// window, owned by a user, not yet reminded.
    pub async fn reminder_candidates(
        &self,
        min_idle_hours: i64,
        max_idle_hours: i64,
        limit: u64,
    ) -> OrdersResult<Vec<cart::Model>> {
        use sea_orm::QuerySelect;
        let now = Utc::now();
        let newest = now - ChronoDuration::hours(min_idle_hours);
        let oldest = now - ChronoDuration::hours(max_idle_hours);
        Ok(cart::Entity::find()
            .filter(cart::Column::Status.eq(CartStatus::Active))
            .filter(cart::Column::ReminderSent.eq(false))
            .filter(cart::Column::UserId.is_not_null())
            .filter(cart::Column::UpdatedAt.lt(newest))
            .filter(cart::Column::UpdatedAt.gt(oldest))
            .filter(cart::Column::ItemCount.gt(0))
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    pub async fn mark_reminder_sent(&self, cart_id: Uuid) -> OrdersResult<()> {
        let cart = cart::Entity::find_by_id(cart_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| OrdersError::not_found("Cart", cart_id))?;
        let txn = self.db.begin().await?;
        let user_id = cart.user_id;
        let mut active: cart::ActiveModel = cart.into();
        active.reminder_sent = Set(true);
        active.reminder_sent_at = Set(Some(Utc::now()));
        active.update(&txn).await?;
        self.events
            .publish_in_tx(
                &txn,
                None,
                DomainEvent::CartReminderDue {
                    cart_id,
                    user_id,
                },
            )
            .await?;
        txn.commit().await?;
        Ok(())
    }

    /// Active carts due a background revalidation pass.
    pub async fn revalidation_candidates(
        &self,
        stale_hours: i64,
        limit: u64,
    ) -> OrdersResult<Vec<uuid::Uuid>> {
        use sea_orm::QuerySelect;
        let cutoff = Utc::now() - ChronoDuration::hours(stale_hours);
        let carts = cart::Entity::find()
            .filter(cart::Column::Status.eq(CartStatus::Active))
            .filter(cart::Column::ItemCount.gt(0))
            .filter(cart::Column::UpdatedAt.lt(cutoff))
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(carts.into_iter().map(|cart| cart.id).collect())
    }

    async fn owned_active_cart(&self, owner: &CartOwner) -> OrdersResult<cart::Model> {
        self.find_active_cart(owner)
            .await?
            .ok_or_else(|| OrdersError::not_found("Cart", "active"))
    }

    async fn owned_item(
        &self,
        cart: &cart::Model,
        item_id: Uuid,
    ) -> OrdersResult<cart_item::Model> {
        let item = cart_item::Entity::find_by_id(item_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| OrdersError::not_found("CartItem", item_id))?;
        if item.cart_id != cart.id {
            return Err(OrdersError::Forbidden("item belongs to another cart".into()));
        }
        Ok(item)
    }
}

fn snapshot_captured_at(item: &cart_item::Model) -> chrono::DateTime<Utc> {
    serde_json::from_value::<PriceSnapshot>(item.price_snapshot.clone())
        .map(|snapshot| snapshot.captured_at)
        .unwrap_or(item.updated_at)
}
