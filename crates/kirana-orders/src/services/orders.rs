//! Order and fulfillment state machine.
//!
//! Transitions are guarded by the permitted-edge tables on the status enums
//! and applied under an optimistic CAS on `orders.version`: the UPDATE
//! carries the version we read, a zero row count means another writer got
//! there first, and we retry up to three times with a jittered 50 ms
//! backoff before reporting a conflict. Every applied transition appends a
//! `status_history` row in the same transaction.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use tracing::instrument;
use uuid::Uuid;

use kirana_core::events::DomainEvent;
use kirana_core::generate_id;
use kirana_outbox::TransactionalEventBus;

use crate::clients::InventoryClient;
use crate::entities::order::{CancelReason, FulfillmentStatus, OrderStatus};
use crate::entities::payment::PaymentStatus;
use crate::entities::status_history::{ActorKind, HistoryKind};
use crate::entities::{checkout_session, order, order_item, payment, status_history};
use crate::error::{OrdersError, OrdersResult};
use crate::services::EngineConfig;

const CAS_ATTEMPTS: u32 = 3;
const CAS_BACKOFF_MS: u64 = 50;

/// Who is driving a transition; lands in the history log.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub kind: ActorKind,
    pub id: Option<Uuid>,
}

impl Actor {
    pub fn system() -> Self {
        Self {
            kind: ActorKind::System,
            id: None,
        }
    }

    pub fn admin(id: Uuid) -> Self {
        Self {
            kind: ActorKind::Admin,
            id: Some(id),
        }
    }

    pub fn customer(id: Uuid) -> Self {
        Self {
            kind: ActorKind::Customer,
            id: Some(id),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransitionExtras {
    pub reason: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub cancel_reason: Option<CancelReason>,
    /// Caller-asserted expected version; a mismatch fails fast with 409.
    pub expected_version: Option<i32>,
}

pub struct OrderService {
    db: DatabaseConnection,
    events: TransactionalEventBus,
    inventory: Arc<dyn InventoryClient>,
    refunds: Arc<crate::services::RefundService>,
    config: EngineConfig,
}

impl OrderService {
    pub fn new(
        db: DatabaseConnection,
        events: TransactionalEventBus,
        inventory: Arc<dyn InventoryClient>,
        refunds: Arc<crate::services::RefundService>,
        config: EngineConfig,
    ) -> Self {
        Self {
            db,
            events,
            inventory,
            refunds,
            config,
        }
    }

    pub async fn get(&self, order_id: Uuid) -> OrdersResult<order::Model> {
        order::Entity::find_by_id(order_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| OrdersError::not_found("Order", order_id))
    }

    pub async fn get_owned(&self, order_id: Uuid, user_id: Uuid) -> OrdersResult<order::Model> {
        let order = self.get(order_id).await?;
        if order.user_id != user_id {
            return Err(OrdersError::not_found("Order", order_id));
        }
        Ok(order)
    }

    pub async fn items_of(&self, order_id: Uuid) -> OrdersResult<Vec<order_item::Model>> {
        Ok(order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    pub async fn history_of(&self, order_id: Uuid) -> OrdersResult<Vec<status_history::Model>> {
        Ok(status_history::Entity::find()
            .filter(status_history::Column::OrderId.eq(order_id))
            .order_by_asc(status_history::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// Apply an order-dimension transition under CAS.
    #[instrument(skip(self, extras))]
    pub async fn transition(
        &self,
        order_id: Uuid,
        next: OrderStatus,
        actor: Actor,
        admin_override: bool,
        extras: TransitionExtras,
    ) -> OrdersResult<order::Model> {
        for attempt in 0..CAS_ATTEMPTS {
            let current = self.get(order_id).await?;

            if let Some(expected) = extras.expected_version {
                if current.version != expected {
                    return Err(OrdersError::Conflict(format!(
                        "order version is {}, expected {expected}",
                        current.version
                    )));
                }
            }

            if !current.status.can_transition_to(next, admin_override) {
                return Err(OrdersError::invalid_state(format!(
                    "order cannot move from {} to {}",
                    current.status.as_str(),
                    next.as_str()
                )));
            }
            if next == OrderStatus::Cancelled && extras.cancel_reason.is_none() {
                return Err(OrdersError::validation("cancel requires a reason"));
            }

            let now = Utc::now();
            let version = current.version;
            let txn = self.db.begin().await?;

            use sea_orm::sea_query::Expr;
            let mut update = order::Entity::update_many()
                .col_expr(order::Column::Status, Expr::value(next))
                .col_expr(order::Column::Version, Expr::value(version + 1))
                .col_expr(order::Column::UpdatedAt, Expr::value(now));
            if next == OrderStatus::Shipped {
                if let Some(tracking) = &extras.tracking_number {
                    update = update
                        .col_expr(order::Column::TrackingNumber, Expr::value(tracking.clone()));
                }
                if let Some(carrier) = &extras.carrier {
                    update = update.col_expr(order::Column::Carrier, Expr::value(carrier.clone()));
                }
                update = update.col_expr(order::Column::ShippedAt, Expr::value(now));
            }
            if next == OrderStatus::Delivered {
                update = update.col_expr(order::Column::DeliveredAt, Expr::value(now));
            }
            if let (OrderStatus::Cancelled, Some(reason)) = (next, extras.cancel_reason) {
                update = update.col_expr(order::Column::CancelReason, Expr::value(reason));
            }

            let result = update
                .filter(order::Column::Id.eq(order_id))
                .filter(order::Column::Version.eq(version))
                .exec(&txn)
                .await?;

            if result.rows_affected == 0 {
                txn.rollback().await?;
                if attempt + 1 == CAS_ATTEMPTS {
                    break;
                }
                let jitter = rand::thread_rng().gen_range(0..CAS_BACKOFF_MS);
                tokio::time::sleep(Duration::from_millis(CAS_BACKOFF_MS + jitter)).await;
                continue;
            }

            append_history(
                &txn,
                order_id,
                HistoryKind::Order,
                current.status.as_str(),
                next.as_str(),
                actor,
                extras.reason.clone(),
            )
            .await?;

            if next == OrderStatus::Shipped {
                self.mark_all_fulfilled(&txn, order_id, actor).await?;
            }

            let event = if next == OrderStatus::Cancelled {
                DomainEvent::OrderCancelled {
                    order_id,
                    reason: extras
                        .reason
                        .clone()
                        .unwrap_or_else(|| "cancelled".to_string()),
                }
            } else {
                DomainEvent::OrderStatusChanged {
                    order_id,
                    from: current.status.as_str().to_string(),
                    to: next.as_str().to_string(),
                }
            };
            self.events.publish_in_tx(&txn, actor.id, event).await?;
            txn.commit().await?;

            tracing::info!(
                order_id = %order_id,
                from = current.status.as_str(),
                to = next.as_str(),
                "order transition applied"
            );
            return self.get(order_id).await;
        }

        Err(OrdersError::ConcurrentUpdate {
            resource: "order",
            id: order_id,
        })
    }

    /// Cancel an order. From a paid state this queues a full refund; from
    /// pending it releases the checkout reservation and voids an initiated
    /// payment.
    #[instrument(skip(self))]
    pub async fn cancel(
        &self,
        order_id: Uuid,
        reason: CancelReason,
        note: Option<String>,
        actor: Actor,
        admin_override: bool,
    ) -> OrdersResult<order::Model> {
        let before = self.get(order_id).await?;
        let was_settled = before.payment_status.is_settled();

        let updated = self
            .transition(
                order_id,
                OrderStatus::Cancelled,
                actor,
                admin_override,
                TransitionExtras {
                    reason: note,
                    cancel_reason: Some(reason),
                    ..Default::default()
                },
            )
            .await?;

        self.release_reservations(order_id).await;

        if was_settled {
            // Money already moved: hand the full amount back through the
            // refund workflow.
            if let Err(error) = self.refunds.enqueue_full_refund(order_id, actor).await {
                tracing::error!(order_id = %order_id, %error, "could not enqueue cancel refund");
            }
        } else {
            self.void_open_payments(order_id, actor).await?;
        }

        Ok(updated)
    }

    /// Release any inventory still held by the originating checkout
    /// session. Expired or unknown grants are fine.
    async fn release_reservations(&self, order_id: Uuid) {
        let session = checkout_session::Entity::find()
            .filter(checkout_session::Column::OrderId.eq(order_id))
            .one(&self.db)
            .await;
        if let Ok(Some(session)) = session {
            let tokens: Vec<String> =
                serde_json::from_value(session.reservation_tokens.clone()).unwrap_or_default();
            if !tokens.is_empty() {
                if let Err(error) = self.inventory.release(&tokens).await {
                    tracing::warn!(order_id = %order_id, %error, "reservation release failed");
                }
            }
        }
    }

    async fn void_open_payments(&self, order_id: Uuid, actor: Actor) -> OrdersResult<()> {
        let open = payment::Entity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .filter(payment::Column::Status.is_in([
                PaymentStatus::Pending,
                PaymentStatus::Initiated,
                PaymentStatus::Processing,
            ]))
            .all(&self.db)
            .await?;
        for row in open {
            let txn = self.db.begin().await?;
            let from = row.status;
            let mut active: payment::ActiveModel = row.into();
            active.status = Set(PaymentStatus::Cancelled);
            active.updated_at = Set(Utc::now());
            let updated = active.update(&txn).await?;
            append_history(
                &txn,
                order_id,
                HistoryKind::Payment,
                from.as_str(),
                PaymentStatus::Cancelled.as_str(),
                actor,
                Some("order cancelled".to_string()),
            )
            .await?;
            set_order_payment_status(&txn, order_id, PaymentStatus::Cancelled, actor).await?;
            txn.commit().await?;
            tracing::info!(payment_id = %updated.id, "open payment voided");
        }
        Ok(())
    }

    /// Advance paid pending orders that sat untouched past the
    /// auto-confirm window. Returns how many were confirmed.
    #[instrument(skip(self))]
    pub async fn auto_confirm(&self, limit: u64) -> OrdersResult<usize> {
        let cutoff = Utc::now() - ChronoDuration::hours(self.config.order_auto_confirm_hours);
        let stale = order::Entity::find()
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .filter(
                order::Column::PaymentStatus
                    .is_in([PaymentStatus::Paid, PaymentStatus::Captured]),
            )
            .filter(order::Column::CreatedAt.lt(cutoff))
            .limit(limit)
            .all(&self.db)
            .await?;

        let mut confirmed = 0;
        for row in stale {
            match self
                .transition(
                    row.id,
                    OrderStatus::Confirmed,
                    Actor::system(),
                    false,
                    TransitionExtras {
                        reason: Some("auto-confirm".to_string()),
                        ..Default::default()
                    },
                )
                .await
            {
                Ok(_) => confirmed += 1,
                Err(error) => {
                    tracing::warn!(order_id = %row.id, %error, "auto-confirm skipped");
                }
            }
        }
        Ok(confirmed)
    }

    async fn mark_all_fulfilled<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
        actor: Actor,
    ) -> OrdersResult<()> {
        let mut items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(conn)
            .await?;
        for item in &mut items {
            if item.quantity_fulfilled < item.quantity {
                let mut active: order_item::ActiveModel = item.clone().into();
                active.quantity_fulfilled = Set(item.quantity);
                active.updated_at = Set(Utc::now());
                *item = active.update(conn).await?;
            }
        }

        let order = order::Entity::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or_else(|| OrdersError::not_found("Order", order_id))?;
        let from = order.fulfillment_status;
        let target = aggregate_fulfillment(&items);
        if from != target {
            let mut active: order::ActiveModel = order.into();
            active.fulfillment_status = Set(target);
            active.update(conn).await?;
            append_history(
                conn,
                order_id,
                HistoryKind::Fulfillment,
                from.as_str(),
                target.as_str(),
                actor,
                None,
            )
            .await?;
        }
        Ok(())
    }
}

/// Append a status-history row in the caller's transaction.
pub(crate) async fn append_history<C: sea_orm::ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    kind: HistoryKind,
    from_status: &str,
    to_status: &str,
    actor: Actor,
    reason: Option<String>,
) -> OrdersResult<()> {
    status_history::ActiveModel {
        id: Set(generate_id()),
        order_id: Set(order_id),
        kind: Set(kind),
        from_status: Set(from_status.to_string()),
        to_status: Set(to_status.to_string()),
        changed_by: Set(actor.kind),
        actor_id: Set(actor.id),
        reason: Set(reason),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await?;
    Ok(())
}

/// Payment-dimension change on the order record, with its history row.
/// Skips silently when the edge is not an advance.
pub(crate) async fn set_order_payment_status<C: sea_orm::ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
    next: PaymentStatus,
    actor: Actor,
) -> OrdersResult<()> {
    let order = order::Entity::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| OrdersError::not_found("Order", order_id))?;
    if order.payment_status == next || !order.payment_status.can_transition_to(next) {
        return Ok(());
    }
    let from = order.payment_status;
    let mut active: order::ActiveModel = order.into();
    active.payment_status = Set(next);
    active.updated_at = Set(Utc::now());
    active.update(conn).await?;
    append_history(
        conn,
        order_id,
        HistoryKind::Payment,
        from.as_str(),
        next.as_str(),
        actor,
        None,
    )
    .await?;
    Ok(())
}

/// Aggregate of per-line fulfillment counters.
pub fn aggregate_fulfillment(items: &[order_item::Model]) -> FulfillmentStatus {
    if items.is_empty() || items.iter().all(|item| item.quantity_fulfilled == 0) {
        FulfillmentStatus::Unfulfilled
    } else if items.iter().all(|item| item.quantity_fulfilled >= item.quantity) {
        FulfillmentStatus::Fulfilled
    } else {
        FulfillmentStatus::PartiallyFulfilled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn item(quantity: i32, fulfilled: i32) -> order_item::Model {
        let now = Utc::now();
        order_item::Model {
            id: generate_id(),
            order_id: generate_id(),
            product_id: generate_id(),
            variant_id: generate_id(),
            bundle_id: None,
            sku: None,
            name: "Line".to_string(),
            image_url: None,
            hsn_code: None,
            quantity,
            quantity_fulfilled: fulfilled,
            quantity_returned: 0,
            quantity_refunded: 0,
            unit_price: Decimal::ONE,
            unit_mrp: Decimal::ONE,
            line_discount: Decimal::ZERO,
            line_tax: Decimal::ZERO,
            line_total: Decimal::from(quantity),
            is_free_gift: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn fulfillment_aggregates_across_lines() {
        assert_eq!(aggregate_fulfillment(&[]), FulfillmentStatus::Unfulfilled);
        assert_eq!(
            aggregate_fulfillment(&[item(2, 0), item(1, 0)]),
            FulfillmentStatus::Unfulfilled
        );
        assert_eq!(
            aggregate_fulfillment(&[item(2, 2), item(1, 0)]),
            FulfillmentStatus::PartiallyFulfilled
        );
        assert_eq!(
            aggregate_fulfillment(&[item(2, 2), item(1, 1)]),
            FulfillmentStatus::Fulfilled
        );
    }
}
