//! Price and availability revalidation.
//!
//! Cart lines cache a price snapshot; the catalog keeps moving. This pass
//! reconciles the two: repriced lines get rewritten in place with a fresh
//! snapshot, vanished products/variants get flagged, and the caller receives
//! an aggregated report. Re-running on refreshed data yields an empty
//! change set.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use tracing::instrument;
use uuid::Uuid;

use kirana_core::money::round_money;

use crate::clients::{CatalogClient, PricingClient, ProductLifecycle, VariantPrice};
use crate::entities::{cart, cart_item};
use crate::error::{OrdersError, OrdersResult};
use crate::types::{
    PriceChange, PriceSnapshot, RevalidationWarning, UnavailableItem, WarningSeverity,
};

/// Two price reads within this tolerance are the same price.
pub const PRICE_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 2); // 0.01

#[derive(Debug, Clone, Default)]
pub struct RevalidationReport {
    pub price_changes: Vec<PriceChange>,
    pub unavailable: Vec<UnavailableItem>,
    pub warnings: Vec<RevalidationWarning>,
}

impl RevalidationReport {
    pub fn is_clean(&self) -> bool {
        self.price_changes.is_empty() && self.unavailable.is_empty()
    }
}

pub struct RevalidationService {
    db: DatabaseConnection,
    catalog: Arc<dyn CatalogClient>,
    pricing: Arc<dyn PricingClient>,
}

impl RevalidationService {
    pub fn new(
        db: DatabaseConnection,
        catalog: Arc<dyn CatalogClient>,
        pricing: Arc<dyn PricingClient>,
    ) -> Self {
        Self {
            db,
            catalog,
            pricing,
        }
    }

    /// Revalidate every line of a cart. No mutation happens if an upstream
    /// is unavailable; the caller decides whether that degrades (cart read)
    /// or aborts (checkout).
    #[instrument(skip(self))]
    pub async fn revalidate_cart(&self, cart_id: Uuid) -> OrdersResult<RevalidationReport> {
        let cart = cart::Entity::find_by_id(cart_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| OrdersError::not_found("Cart", cart_id))?;

        let items = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .all(&self.db)
            .await?;

        if items.is_empty() {
            return Ok(RevalidationReport::default());
        }

        let variant_ids: Vec<Uuid> = items.iter().map(|item| item.variant_id).collect();
        // One bulk pricing call, per-line catalog lookups. Both must succeed
        // before anything is written.
        let prices = self
            .pricing
            .prices(&variant_ids)
            .await
            .map_err(|_| OrdersError::PricingUnavailable)?;

        let mut availability: HashMap<Uuid, (bool, bool, String)> = HashMap::new();
        for item in &items {
            let product = self
                .catalog
                .product(item.product_id)
                .await
                .map_err(|_| OrdersError::CatalogUnavailable)?;
            let product_ok = matches!(
                product.as_ref().map(|p| p.status),
                Some(ProductLifecycle::Active)
            );
            let variant = self
                .catalog
                .variant(item.variant_id)
                .await
                .map_err(|_| OrdersError::CatalogUnavailable)?;
            let variant_ok = variant.as_ref().map(|v| v.active).unwrap_or(false);
            let reason = if !product_ok {
                "product unavailable".to_string()
            } else if !variant_ok {
                "variant unavailable".to_string()
            } else {
                String::new()
            };
            availability.insert(item.id, (product_ok, variant_ok, reason));
        }

        let mut report = RevalidationReport::default();
        let mut increase_delta = Decimal::ZERO;
        let mut decrease_delta = Decimal::ZERO;
        let now = Utc::now();

        let txn = self.db.begin().await?;
        for item in &items {
            let (product_ok, variant_ok, reason) = availability
                .get(&item.id)
                .cloned()
                .unwrap_or((false, false, "not checked".to_string()));

            let mut active: cart_item::ActiveModel = item.clone().into();
            active.product_exists = Set(product_ok);
            active.variant_exists = Set(variant_ok);
            active.last_checked_at = Set(Some(now));

            if !product_ok || !variant_ok {
                report.unavailable.push(UnavailableItem {
                    cart_item_id: item.id,
                    variant_id: item.variant_id,
                    reason,
                });
            }

            if let Some(price) = prices.get(&item.variant_id) {
                if let Some(change) = reprice(item, price, now, &mut active) {
                    let delta =
                        (change.new_price - change.old_price) * Decimal::from(item.quantity);
                    if delta > Decimal::ZERO {
                        increase_delta += delta;
                    } else {
                        decrease_delta += -delta;
                    }
                    report.price_changes.push(change);
                }
            }

            active.updated_at = Set(now);
            active.update(&txn).await?;
        }
        txn.commit().await?;

        if increase_delta > Decimal::ZERO {
            report.warnings.push(RevalidationWarning {
                code: "PRICE_INCREASE".to_string(),
                severity: WarningSeverity::Medium,
                message: format!("prices went up by ₹{}", round_money(increase_delta)),
                amount_delta: Some(round_money(increase_delta)),
            });
        }
        if decrease_delta > Decimal::ZERO {
            report.warnings.push(RevalidationWarning {
                code: "PRICE_DECREASE".to_string(),
                severity: WarningSeverity::Low,
                message: format!("prices went down by ₹{}", round_money(decrease_delta)),
                amount_delta: Some(round_money(decrease_delta)),
            });
        }
        if !report.unavailable.is_empty() {
            report.warnings.push(RevalidationWarning {
                code: "ITEMS_UNAVAILABLE".to_string(),
                severity: WarningSeverity::High,
                message: format!("{} item(s) are no longer available", report.unavailable.len()),
                amount_delta: None,
            });
        }

        Ok(report)
    }
}

/// Rewrite a line's money fields if the current price moved beyond the
/// tolerance. Returns the recorded change, or None when within ε.
fn reprice(
    item: &cart_item::Model,
    price: &VariantPrice,
    now: chrono::DateTime<Utc>,
    active: &mut cart_item::ActiveModel,
) -> Option<PriceChange> {
    let new_price = round_money(price.final_price);
    let delta = (new_price - item.unit_price).abs();
    if delta <= PRICE_EPSILON {
        return None;
    }

    let line_total = compute_line_total(item.quantity, new_price, item.line_discount);
    active.unit_price = Set(new_price);
    active.unit_mrp = Set(round_money(price.mrp));
    active.line_total = Set(line_total);
    active.price_changed = Set(true);
    active.old_price = Set(Some(item.unit_price));
    active.new_price = Set(Some(new_price));
    active.price_changed_at = Set(Some(now));
    active.price_snapshot = Set(serde_json::to_value(PriceSnapshot {
        unit_price: new_price,
        unit_mrp: round_money(price.mrp),
        captured_at: now,
        discount_percent: price.discount_percent,
    })
    .expect("price snapshot serializes"));

    Some(PriceChange {
        cart_item_id: item.id,
        variant_id: item.variant_id,
        old_price: item.unit_price,
        new_price,
    })
}

/// `line_total = quantity * unit_price - line_discount`, never negative.
pub fn compute_line_total(quantity: i32, unit_price: Decimal, line_discount: Decimal) -> Decimal {
    let total = Decimal::from(quantity) * unit_price - line_discount;
    round_money(total.max(Decimal::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn epsilon_is_one_paisa() {
        assert_eq!(PRICE_EPSILON, dec!(0.01));
    }

    #[test]
    fn line_total_clamps_at_zero() {
        assert_eq!(compute_line_total(2, dec!(100.00), dec!(0)), dec!(200.00));
        assert_eq!(compute_line_total(1, dec!(50.00), dec!(60.00)), dec!(0.00));
    }
}
