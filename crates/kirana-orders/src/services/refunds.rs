//! Refund workflow: request, approval, dispatch, completion.
//!
//! Completion is idempotent and reachable from two directions: the
//! synchronous gateway dispatch and the `refund.processed` webhook. Both
//! funnel into the same finalizer, which stamps `quantity_refunded` on the
//! order items and derives the payment status from the refunded amount.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::instrument;
use uuid::Uuid;

use kirana_core::events::DomainEvent;
use kirana_core::money::{paise, round_money};
use kirana_core::generate_id;
use kirana_outbox::TransactionalEventBus;

use crate::clients::PaymentGatewayClient;
use crate::dto::refund::{ApproveRefundInput, RequestRefundInput};
use crate::entities::payment::PaymentStatus;
use crate::entities::refund::{RefundMethod, RefundStatus};
use crate::entities::{order, order_item, payment, refund};
use crate::error::{OrdersError, OrdersResult};
use crate::services::orders::{set_order_payment_status, Actor};
use crate::services::{sequence, EngineConfig};
use crate::types::RefundItemEntry;

pub struct RefundService {
    db: DatabaseConnection,
    events: TransactionalEventBus,
    gateway: Arc<dyn PaymentGatewayClient>,
    config: EngineConfig,
}

impl RefundService {
    pub fn new(
        db: DatabaseConnection,
        events: TransactionalEventBus,
        gateway: Arc<dyn PaymentGatewayClient>,
        config: EngineConfig,
    ) -> Self {
        Self {
            db,
            events,
            gateway,
            config,
        }
    }

    pub async fn get(&self, refund_id: Uuid) -> OrdersResult<refund::Model> {
        refund::Entity::find_by_id(refund_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| OrdersError::not_found("Refund", refund_id))
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> OrdersResult<Vec<refund::Model>> {
        Ok(refund::Entity::find()
            .filter(refund::Column::UserId.eq(user_id))
            .order_by_desc(refund::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// Customer-initiated refund request. Every line must stay within its
    /// remaining refundable quantity; the per-line amount subtracts the
    /// proportional share of the line discount.
    #[instrument(skip(self, input))]
    pub async fn request(
        &self,
        user_id: Uuid,
        input: RequestRefundInput,
    ) -> OrdersResult<refund::Model> {
        let order = order::Entity::find_by_id(input.order_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| OrdersError::not_found("Order", input.order_id))?;
        if order.user_id != user_id {
            return Err(OrdersError::not_found("Order", input.order_id));
        }

        let payment = self.settled_payment_of(order.id).await?;

        let mut entries: Vec<RefundItemEntry> = Vec::with_capacity(input.items.len());
        let mut total = Decimal::ZERO;
        for line in &input.items {
            let item = order_item::Entity::find_by_id(line.order_item_id)
                .one(&self.db)
                .await?
                .ok_or_else(|| OrdersError::not_found("OrderItem", line.order_item_id))?;
            if item.order_id != order.id {
                return Err(OrdersError::validation("item belongs to another order"));
            }
            let remaining = item.remaining_refundable();
            if line.quantity > remaining {
                return Err(OrdersError::validation(format!(
                    "only {remaining} unit(s) of {} remain refundable",
                    item.name
                )));
            }
            let amount = line_refund_amount(&item, line.quantity);
            total += amount;
            entries.push(RefundItemEntry {
                order_item_id: item.id,
                quantity: line.quantity,
                amount,
            });
        }

        let total = round_money(total);
        let remaining_on_payment = payment.amount - payment.refunded_amount;
        if total > remaining_on_payment {
            return Err(OrdersError::validation(format!(
                "refund {total} exceeds remaining payment amount {remaining_on_payment}"
            )));
        }

        let now = Utc::now();
        let txn = self.db.begin().await?;
        let number = sequence::allocate(
            &txn,
            sequence::KIND_REFUND,
            now,
            self.config.tz_offset_minutes,
        )
        .await?;
        let model = refund::ActiveModel {
            id: Set(generate_id()),
            refund_number: Set(number),
            order_id: Set(order.id),
            payment_id: Set(payment.id),
            user_id: Set(user_id),
            refund_amount: Set(total),
            approved_amount: Set(None),
            method: Set(input.method),
            status: Set(RefundStatus::Requested),
            items: Set(serde_json::to_value(&entries)?),
            description: Set(input.description),
            approved_by: Set(None),
            gateway_refund_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&txn).await?;
        self.events
            .publish_in_tx(
                &txn,
                Some(user_id),
                DomainEvent::RefundRequested {
                    refund_id: created.id,
                    order_id: order.id,
                    amount: total,
                },
            )
            .await?;
        txn.commit().await?;
        Ok(created)
    }

    /// Full refund of everything still refundable, queued by order
    /// cancellation from a paid state. Lands in `requested` for admin
    /// approval like any other refund.
    pub(crate) async fn enqueue_full_refund(
        &self,
        order_id: Uuid,
        actor: Actor,
    ) -> OrdersResult<Option<refund::Model>> {
        let order = order::Entity::find_by_id(order_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| OrdersError::not_found("Order", order_id))?;
        let payment = self.settled_payment_of(order_id).await?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&self.db)
            .await?;
        let mut entries = Vec::new();
        let mut total = Decimal::ZERO;
        for item in &items {
            let quantity = item.remaining_refundable();
            if quantity == 0 {
                continue;
            }
            let amount = line_refund_amount(item, quantity);
            total += amount;
            entries.push(RefundItemEntry {
                order_item_id: item.id,
                quantity,
                amount,
            });
        }
        if entries.is_empty() {
            return Ok(None);
        }
        let total = round_money(total.min(payment.amount - payment.refunded_amount));

        let now = Utc::now();
        let txn = self.db.begin().await?;
        let number = sequence::allocate(
            &txn,
            sequence::KIND_REFUND,
            now,
            self.config.tz_offset_minutes,
        )
        .await?;
        let model = refund::ActiveModel {
            id: Set(generate_id()),
            refund_number: Set(number),
            order_id: Set(order_id),
            payment_id: Set(payment.id),
            user_id: Set(order.user_id),
            refund_amount: Set(total),
            approved_amount: Set(None),
            method: Set(RefundMethod::OriginalPaymentMethod),
            status: Set(RefundStatus::Requested),
            items: Set(serde_json::to_value(&entries)?),
            description: Set(Some("full refund on cancellation".to_string())),
            approved_by: Set(None),
            gateway_refund_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&txn).await?;
        self.events
            .publish_in_tx(
                &txn,
                actor.id,
                DomainEvent::RefundRequested {
                    refund_id: created.id,
                    order_id,
                    amount: total,
                },
            )
            .await?;
        txn.commit().await?;
        Ok(Some(created))
    }

    #[instrument(skip(self))]
    pub async fn approve(
        &self,
        admin_id: Uuid,
        refund_id: Uuid,
        input: ApproveRefundInput,
    ) -> OrdersResult<refund::Model> {
        let row = self.get(refund_id).await?;
        self.guard_transition(&row, RefundStatus::Approved)?;

        let approved = round_money(input.approved_amount.unwrap_or(row.refund_amount));
        if approved <= Decimal::ZERO || approved > row.refund_amount {
            return Err(OrdersError::validation(format!(
                "approved amount must be within (0, {}]",
                row.refund_amount
            )));
        }

        let mut active: refund::ActiveModel = row.into();
        active.status = Set(RefundStatus::Approved);
        active.approved_amount = Set(Some(approved));
        active.approved_by = Set(Some(admin_id));
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn reject(&self, admin_id: Uuid, refund_id: Uuid) -> OrdersResult<refund::Model> {
        let row = self.get(refund_id).await?;
        self.guard_transition(&row, RefundStatus::Rejected)?;
        let mut active: refund::ActiveModel = row.into();
        active.status = Set(RefundStatus::Rejected);
        active.approved_by = Set(Some(admin_id));
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, user_id: Uuid, refund_id: Uuid) -> OrdersResult<refund::Model> {
        let row = self.get(refund_id).await?;
        if row.user_id != user_id {
            return Err(OrdersError::not_found("Refund", refund_id));
        }
        self.guard_transition(&row, RefundStatus::Cancelled)?;
        let mut active: refund::ActiveModel = row.into();
        active.status = Set(RefundStatus::Cancelled);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    /// Dispatch an approved refund. Original-method refunds go through the
    /// gateway and stay in `processing` when it cannot be reached; the
    /// webhook or reconciliation finishes the job. Bank transfers and store
    /// credit settle immediately.
    #[instrument(skip(self))]
    pub async fn process(&self, admin_id: Uuid, refund_id: Uuid) -> OrdersResult<refund::Model> {
        let row = self.get(refund_id).await?;
        self.guard_transition(&row, RefundStatus::Processing)?;
        let approved = row
            .approved_amount
            .ok_or_else(|| OrdersError::invalid_state("refund has no approved amount"))?;

        let mut active: refund::ActiveModel = row.clone().into();
        active.status = Set(RefundStatus::Processing);
        active.updated_at = Set(Utc::now());
        let processing = active.update(&self.db).await?;

        match processing.method {
            RefundMethod::OriginalPaymentMethod => {
                let payment = payment::Entity::find_by_id(processing.payment_id)
                    .one(&self.db)
                    .await?
                    .ok_or_else(|| OrdersError::not_found("Payment", processing.payment_id))?;
                let gateway_payment_id = payment.gateway_payment_id.clone().ok_or_else(|| {
                    OrdersError::invalid_state("payment has no gateway payment id")
                })?;
                let amount_paise = paise(approved)
                    .ok_or_else(|| OrdersError::Internal("amount out of range".into()))?;
                let idempotency_key = format!("refund-{}", processing.refund_number);

                match self
                    .gateway
                    .create_refund(&gateway_payment_id, amount_paise, &idempotency_key)
                    .await
                {
                    Ok(gateway_refund) => {
                        self.finalize(processing.id, Some(gateway_refund.id)).await
                    }
                    Err(error) => {
                        // Leave the row in processing; reconciliation or the
                        // webhook closes it out.
                        tracing::warn!(refund_id = %processing.id, %error, "gateway refund dispatch failed");
                        Err(OrdersError::GatewayUnavailable)
                    }
                }
            }
            RefundMethod::BankTransfer => self.finalize(processing.id, None).await,
            RefundMethod::StoreCredit => {
                let txn = self.db.begin().await?;
                self.events
                    .publish_in_tx(
                        &txn,
                        Some(admin_id),
                        DomainEvent::StoreCreditIssued {
                            user_id: processing.user_id,
                            refund_id: processing.id,
                            amount: approved,
                        },
                    )
                    .await?;
                txn.commit().await?;
                self.finalize(processing.id, None).await
            }
        }
    }

    /// Webhook path: complete the refund bearing this gateway id. Returns
    /// false when it was already completed.
    pub async fn complete_by_gateway_id(
        &self,
        gateway_refund_id: &str,
    ) -> OrdersResult<bool> {
        let row = refund::Entity::find()
            .filter(refund::Column::GatewayRefundId.eq(gateway_refund_id))
            .one(&self.db)
            .await?
            .ok_or_else(|| OrdersError::not_found("Refund", gateway_refund_id))?;
        if row.status == RefundStatus::Completed {
            return Ok(false);
        }
        self.finalize(row.id, None).await?;
        Ok(true)
    }

    /// Terminal bookkeeping: stamp refunded quantities, move the payment's
    /// refunded amount, derive its status, mirror the order. Idempotent by
    /// way of the completed-status guard.
    async fn finalize(
        &self,
        refund_id: Uuid,
        gateway_refund_id: Option<String>,
    ) -> OrdersResult<refund::Model> {
        let row = self.get(refund_id).await?;
        if row.status == RefundStatus::Completed {
            return Ok(row);
        }
        if row.status != RefundStatus::Processing {
            return Err(OrdersError::invalid_state(format!(
                "refund in {} cannot complete",
                row.status.as_str()
            )));
        }
        let approved = row
            .approved_amount
            .ok_or_else(|| OrdersError::invalid_state("refund has no approved amount"))?;
        let entries: Vec<RefundItemEntry> = serde_json::from_value(row.items.clone())?;

        let now = Utc::now();
        let txn = self.db.begin().await?;

        for entry in &entries {
            let item = order_item::Entity::find_by_id(entry.order_item_id)
                .one(&txn)
                .await?
                .ok_or_else(|| OrdersError::not_found("OrderItem", entry.order_item_id))?;
            let mut active: order_item::ActiveModel = item.clone().into();
            active.quantity_refunded = Set(item.quantity_refunded + entry.quantity);
            active.updated_at = Set(now);
            active.update(&txn).await?;
        }

        let payment_row = payment::Entity::find_by_id(row.payment_id)
            .one(&txn)
            .await?
            .ok_or_else(|| OrdersError::not_found("Payment", row.payment_id))?;
        let refunded_total = round_money(payment_row.refunded_amount + approved);
        if refunded_total > payment_row.amount {
            return Err(OrdersError::Internal(format!(
                "refunded amount {refunded_total} exceeds payment amount {}",
                payment_row.amount
            )));
        }
        let payment_status = if refunded_total == payment_row.amount {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        };
        let from = payment_row.status;
        let order_id = payment_row.order_id;
        let mut payment_active: payment::ActiveModel = payment_row.into();
        payment_active.refunded_amount = Set(refunded_total);
        payment_active.status = Set(payment_status);
        payment_active.updated_at = Set(now);
        payment_active.update(&txn).await?;

        crate::services::orders::append_history(
            &txn,
            order_id,
            crate::entities::status_history::HistoryKind::Payment,
            from.as_str(),
            payment_status.as_str(),
            Actor::system(),
            Some(format!("refund {}", row.refund_number)),
        )
        .await?;
        set_order_payment_status(&txn, order_id, payment_status, Actor::system()).await?;

        let mut active: refund::ActiveModel = row.clone().into();
        active.status = Set(RefundStatus::Completed);
        if gateway_refund_id.is_some() {
            active.gateway_refund_id = Set(gateway_refund_id);
        }
        active.updated_at = Set(now);
        let completed = active.update(&txn).await?;

        self.events
            .publish_in_tx(
                &txn,
                None,
                DomainEvent::RefundCompleted {
                    refund_id: completed.id,
                    order_id,
                    amount: approved,
                },
            )
            .await?;
        txn.commit().await?;

        tracing::info!(refund_id = %completed.id, amount = %approved, "refund completed");
        Ok(completed)
    }

    /// Approved-with-amount creation used by return inspection: the verdict
    /// already fixed the amount, so the row skips the request step.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn create_approved<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
        payment_id: Uuid,
        user_id: Uuid,
        entries: &[RefundItemEntry],
        requested_amount: Decimal,
        approved_amount: Decimal,
        approver: Uuid,
        description: String,
    ) -> OrdersResult<refund::Model> {
        let now = Utc::now();
        let number = sequence::allocate(
            conn,
            sequence::KIND_REFUND,
            now,
            self.config.tz_offset_minutes,
        )
        .await?;
        let model = refund::ActiveModel {
            id: Set(generate_id()),
            refund_number: Set(number),
            order_id: Set(order_id),
            payment_id: Set(payment_id),
            user_id: Set(user_id),
            refund_amount: Set(round_money(requested_amount)),
            approved_amount: Set(Some(round_money(approved_amount))),
            method: Set(RefundMethod::OriginalPaymentMethod),
            status: Set(RefundStatus::Approved),
            items: Set(serde_json::to_value(entries)?),
            description: Set(Some(description)),
            approved_by: Set(Some(approver)),
            gateway_refund_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(conn).await?)
    }

    pub(crate) async fn settled_payment_of(&self, order_id: Uuid) -> OrdersResult<payment::Model> {
        let payments = payment::Entity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .all(&self.db)
            .await?;
        payments
            .into_iter()
            .find(|row| {
                row.status.is_settled() || row.status == PaymentStatus::Refunded
            })
            .ok_or_else(|| OrdersError::invalid_state("order has no settled payment"))
    }

    fn guard_transition(&self, row: &refund::Model, next: RefundStatus) -> OrdersResult<()> {
        if !row.status.can_transition_to(next) {
            return Err(OrdersError::invalid_state(format!(
                "refund cannot move from {} to {}",
                row.status.as_str(),
                next.as_str()
            )));
        }
        Ok(())
    }
}

/// Per-line refundable amount: `unit_price * qty` minus the proportional
/// share of the line discount.
pub fn line_refund_amount(item: &order_item::Model, quantity: i32) -> Decimal {
    let qty = Decimal::from(quantity);
    let gross = item.unit_price * qty;
    let discount_share = if item.quantity > 0 {
        item.line_discount * qty / Decimal::from(item.quantity)
    } else {
        Decimal::ZERO
    };
    round_money((gross - discount_share).max(Decimal::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(quantity: i32, unit_price: Decimal, line_discount: Decimal) -> order_item::Model {
        let now = Utc::now();
        order_item::Model {
            id: generate_id(),
            order_id: generate_id(),
            product_id: generate_id(),
            variant_id: generate_id(),
            bundle_id: None,
            sku: None,
            name: "Ashwagandha 60caps".to_string(),
            image_url: None,
            hsn_code: None,
            quantity,
            quantity_fulfilled: quantity,
            quantity_returned: 0,
            quantity_refunded: 0,
            unit_price,
            unit_mrp: unit_price,
            line_discount,
            line_tax: Decimal::ZERO,
            line_total: unit_price * Decimal::from(quantity) - line_discount,
            is_free_gift: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn refund_amount_without_discount_is_price_times_qty() {
        assert_eq!(line_refund_amount(&item(2, dec!(500.00), dec!(0)), 1), dec!(500.00));
    }

    #[test]
    fn refund_amount_subtracts_proportional_discount() {
        // 3 units, ₹60 line discount → ₹20 per unit.
        assert_eq!(
            line_refund_amount(&item(3, dec!(100.00), dec!(60.00)), 2),
            dec!(160.00)
        );
    }
}
