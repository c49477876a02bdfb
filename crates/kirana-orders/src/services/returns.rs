//! Return workflow: request → pickup → inspection → refund.
//!
//! Returns are only accepted while the window is open: the deadline is the
//! end of the delivery day plus `return_window_days`, evaluated in the
//! business timezone, so "delivered exactly N days ago at 23:59:59" is
//! still eligible and one second later is not.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::instrument;
use uuid::Uuid;

use kirana_core::events::DomainEvent;
use kirana_core::money::round_money;
use kirana_core::generate_id;
use kirana_outbox::TransactionalEventBus;

use crate::dto::return_request::{InspectReturnInput, RequestReturnInput, SchedulePickupInput};
use crate::entities::order::OrderStatus;
use crate::entities::return_request::{InspectionVerdict, ReturnStatus};
use crate::entities::{order, order_item, return_request};
use crate::error::{OrdersError, OrdersResult};
use crate::services::orders::Actor;
use crate::services::refunds::line_refund_amount;
use crate::services::{sequence, EngineConfig, RefundService};
use crate::types::{PickupSlot, RefundItemEntry, ReturnItemEntry};

pub struct ReturnService {
    db: DatabaseConnection,
    events: TransactionalEventBus,
    refunds: Arc<RefundService>,
    config: EngineConfig,
}

impl ReturnService {
    pub fn new(
        db: DatabaseConnection,
        events: TransactionalEventBus,
        refunds: Arc<RefundService>,
        config: EngineConfig,
    ) -> Self {
        Self {
            db,
            events,
            refunds,
            config,
        }
    }

    pub async fn get(&self, return_id: Uuid) -> OrdersResult<return_request::Model> {
        return_request::Entity::find_by_id(return_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| OrdersError::not_found("Return", return_id))
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> OrdersResult<Vec<return_request::Model>> {
        Ok(return_request::Entity::find()
            .filter(return_request::Column::UserId.eq(user_id))
            .order_by_desc(return_request::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    /// Open a return for delivered goods, inside the return window.
    #[instrument(skip(self, input))]
    pub async fn request(
        &self,
        user_id: Uuid,
        input: RequestReturnInput,
    ) -> OrdersResult<return_request::Model> {
        let order = order::Entity::find_by_id(input.order_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| OrdersError::not_found("Order", input.order_id))?;
        if order.user_id != user_id {
            return Err(OrdersError::not_found("Order", input.order_id));
        }
        if order.status != OrderStatus::Delivered {
            return Err(OrdersError::invalid_state(
                "only delivered orders can be returned",
            ));
        }
        let delivered_at = order
            .delivered_at
            .ok_or_else(|| OrdersError::invalid_state("order has no delivery timestamp"))?;
        let deadline = return_deadline(
            delivered_at,
            self.config.return_window_days,
            self.config.tz_offset_minutes,
        );
        if Utc::now() > deadline {
            return Err(OrdersError::ReturnWindowClosed);
        }

        let mut entries: Vec<ReturnItemEntry> = Vec::with_capacity(input.items.len());
        for line in &input.items {
            let item = order_item::Entity::find_by_id(line.order_item_id)
                .one(&self.db)
                .await?
                .ok_or_else(|| OrdersError::not_found("OrderItem", line.order_item_id))?;
            if item.order_id != order.id {
                return Err(OrdersError::validation("item belongs to another order"));
            }
            let returnable = item.remaining_returnable();
            if line.quantity > returnable {
                return Err(OrdersError::validation(format!(
                    "only {returnable} unit(s) of {} remain returnable",
                    item.name
                )));
            }
            entries.push(ReturnItemEntry {
                order_item_id: item.id,
                quantity: line.quantity,
                reason: line.reason.clone(),
                condition: line.condition.clone(),
                images: line.images.clone(),
            });
        }

        let pickup_address = match input.pickup_address {
            Some(address) => serde_json::to_value(crate::types::AddressSnapshot::from(address))?,
            None => order.shipping_address.clone(),
        };

        let now = Utc::now();
        let txn = self.db.begin().await?;
        let number = sequence::allocate(
            &txn,
            sequence::KIND_RETURN,
            now,
            self.config.tz_offset_minutes,
        )
        .await?;
        let model = return_request::ActiveModel {
            id: Set(generate_id()),
            return_number: Set(number),
            order_id: Set(order.id),
            user_id: Set(user_id),
            items: Set(serde_json::to_value(&entries)?),
            status: Set(ReturnStatus::Requested),
            pickup_address: Set(pickup_address),
            pickup_slot: Set(None),
            tracking_number: Set(None),
            inspection_verdict: Set(None),
            inspection_notes: Set(None),
            refund_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&txn).await?;
        self.events
            .publish_in_tx(
                &txn,
                Some(user_id),
                DomainEvent::ReturnRequested {
                    return_id: created.id,
                    order_id: order.id,
                },
            )
            .await?;
        txn.commit().await?;
        Ok(created)
    }

    pub async fn approve(&self, admin_id: Uuid, return_id: Uuid) -> OrdersResult<return_request::Model> {
        self.transition(return_id, ReturnStatus::Approved, Actor::admin(admin_id), |_| Ok(()))
            .await
    }

    pub async fn reject(&self, admin_id: Uuid, return_id: Uuid) -> OrdersResult<return_request::Model> {
        self.transition(return_id, ReturnStatus::Rejected, Actor::admin(admin_id), |_| Ok(()))
            .await
    }

    /// Customer cancel, only from `requested` or `approved`.
    pub async fn cancel(&self, user_id: Uuid, return_id: Uuid) -> OrdersResult<return_request::Model> {
        let row = self.get(return_id).await?;
        if row.user_id != user_id {
            return Err(OrdersError::not_found("Return", return_id));
        }
        if !matches!(row.status, ReturnStatus::Requested | ReturnStatus::Approved) {
            return Err(OrdersError::invalid_state(format!(
                "return in {} cannot be cancelled by the customer",
                row.status.as_str()
            )));
        }
        self.transition(return_id, ReturnStatus::Cancelled, Actor::customer(user_id), |_| Ok(()))
            .await
    }

    #[instrument(skip(self, input))]
    pub async fn schedule_pickup(
        &self,
        admin_id: Uuid,
        return_id: Uuid,
        input: SchedulePickupInput,
    ) -> OrdersResult<return_request::Model> {
        let slot = PickupSlot {
            date: input.date,
            window: input.window,
        };
        let slot_json = serde_json::to_value(&slot)?;
        self.transition(
            return_id,
            ReturnStatus::PickupScheduled,
            Actor::admin(admin_id),
            move |active| {
                active.pickup_slot = Set(Some(slot_json));
                Ok(())
            },
        )
        .await
    }

    pub async fn mark_picked_up(
        &self,
        admin_id: Uuid,
        return_id: Uuid,
        tracking_number: Option<String>,
    ) -> OrdersResult<return_request::Model> {
        self.transition(
            return_id,
            ReturnStatus::PickedUp,
            Actor::admin(admin_id),
            move |active| {
                if tracking_number.is_some() {
                    active.tracking_number = Set(tracking_number);
                }
                Ok(())
            },
        )
        .await
    }

    pub async fn mark_in_transit(&self, return_id: Uuid) -> OrdersResult<return_request::Model> {
        self.transition(return_id, ReturnStatus::InTransit, Actor::system(), |_| Ok(()))
            .await
    }

    pub async fn mark_received(&self, admin_id: Uuid, return_id: Uuid) -> OrdersResult<return_request::Model> {
        self.transition(return_id, ReturnStatus::Received, Actor::admin(admin_id), |_| Ok(()))
            .await
    }

    /// Record the inspection verdict. Acceptance (full or partial) creates
    /// an approved refund and moves to `refund_initiated`; rejection closes
    /// the return.
    #[instrument(skip(self, input))]
    pub async fn inspect(
        &self,
        admin_id: Uuid,
        return_id: Uuid,
        input: InspectReturnInput,
    ) -> OrdersResult<return_request::Model> {
        let row = self.get(return_id).await?;
        if row.status != ReturnStatus::Received {
            return Err(OrdersError::invalid_state(format!(
                "return in {} cannot be inspected",
                row.status.as_str()
            )));
        }

        let entries: Vec<ReturnItemEntry> = serde_json::from_value(row.items.clone())?;
        let (refund_entries, full_amount) = self.refundable_entries(&row, &entries).await?;

        let notes = input.notes.clone();
        let verdict = input.verdict;
        let inspected = self
            .transition(
                return_id,
                ReturnStatus::Inspected,
                Actor::admin(admin_id),
                move |active| {
                    active.inspection_verdict = Set(Some(verdict));
                    active.inspection_notes = Set(notes);
                    Ok(())
                },
            )
            .await?;

        match input.verdict {
            InspectionVerdict::Rejected => {
                self.transition(
                    return_id,
                    ReturnStatus::Cancelled,
                    Actor::admin(admin_id),
                    |_| Ok(()),
                )
                .await
            }
            InspectionVerdict::Accepted | InspectionVerdict::Partial => {
                let approved_amount = match input.verdict {
                    InspectionVerdict::Partial => {
                        let partial = input.partial_amount.ok_or_else(|| {
                            OrdersError::validation("partial verdict requires an amount")
                        })?;
                        if partial <= Decimal::ZERO || partial > full_amount {
                            return Err(OrdersError::validation(format!(
                                "partial amount must be within (0, {full_amount}]"
                            )));
                        }
                        round_money(partial)
                    }
                    _ => full_amount,
                };

                let payment = self.refunds.settled_payment_of(row.order_id).await?;
                let now = Utc::now();
                let txn = self.db.begin().await?;
                let refund = self
                    .refunds
                    .create_approved(
                        &txn,
                        row.order_id,
                        payment.id,
                        row.user_id,
                        &refund_entries,
                        full_amount,
                        approved_amount,
                        admin_id,
                        format!("return {}", row.return_number),
                    )
                    .await?;

                // Goods are back in hand: stamp the returned quantities.
                for entry in &entries {
                    let item = order_item::Entity::find_by_id(entry.order_item_id)
                        .one(&txn)
                        .await?
                        .ok_or_else(|| OrdersError::not_found("OrderItem", entry.order_item_id))?;
                    let mut active: order_item::ActiveModel = item.clone().into();
                    active.quantity_returned = Set(item.quantity_returned + entry.quantity);
                    active.updated_at = Set(now);
                    active.update(&txn).await?;
                }

                let mut active: return_request::ActiveModel = inspected.clone().into();
                active.status = Set(ReturnStatus::RefundInitiated);
                active.refund_id = Set(Some(refund.id));
                active.updated_at = Set(now);
                let updated = active.update(&txn).await?;

                self.events
                    .publish_in_tx(
                        &txn,
                        Some(admin_id),
                        DomainEvent::ReturnStatusChanged {
                            return_id,
                            from: ReturnStatus::Inspected.as_str().to_string(),
                            to: ReturnStatus::RefundInitiated.as_str().to_string(),
                        },
                    )
                    .await?;
                txn.commit().await?;
                Ok(updated)
            }
        }
    }

    /// Close out a return whose refund finished.
    pub async fn complete(&self, return_id: Uuid) -> OrdersResult<return_request::Model> {
        self.transition(return_id, ReturnStatus::Completed, Actor::system(), |_| Ok(()))
            .await
    }

    async fn refundable_entries(
        &self,
        row: &return_request::Model,
        entries: &[ReturnItemEntry],
    ) -> OrdersResult<(Vec<RefundItemEntry>, Decimal)> {
        let mut refund_entries = Vec::with_capacity(entries.len());
        let mut total = Decimal::ZERO;
        for entry in entries {
            let item = order_item::Entity::find_by_id(entry.order_item_id)
                .one(&self.db)
                .await?
                .ok_or_else(|| OrdersError::not_found("OrderItem", entry.order_item_id))?;
            if item.order_id != row.order_id {
                return Err(OrdersError::validation("item belongs to another order"));
            }
            let amount = line_refund_amount(&item, entry.quantity);
            total += amount;
            refund_entries.push(RefundItemEntry {
                order_item_id: entry.order_item_id,
                quantity: entry.quantity,
                amount,
            });
        }
        Ok((refund_entries, round_money(total)))
    }

    async fn transition<F>(
        &self,
        return_id: Uuid,
        next: ReturnStatus,
        actor: Actor,
        mutate: F,
    ) -> OrdersResult<return_request::Model>
    where
        F: FnOnce(&mut return_request::ActiveModel) -> OrdersResult<()>,
    {
        let row = self.get(return_id).await?;
        if !row.status.can_transition_to(next) {
            return Err(OrdersError::invalid_state(format!(
                "return cannot move from {} to {}",
                row.status.as_str(),
                next.as_str()
            )));
        }

        let from = row.status;
        let txn = self.db.begin().await?;
        let mut active: return_request::ActiveModel = row.into();
        mutate(&mut active)?;
        active.status = Set(next);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        self.events
            .publish_in_tx(
                &txn,
                actor.id,
                DomainEvent::ReturnStatusChanged {
                    return_id,
                    from: from.as_str().to_string(),
                    to: next.as_str().to_string(),
                },
            )
            .await?;
        txn.commit().await?;

        tracing::info!(
            return_id = %return_id,
            from = from.as_str(),
            to = next.as_str(),
            "return transition applied"
        );
        Ok(updated)
    }
}

/// End of the delivery day plus the window, in the business timezone.
pub fn return_deadline(
    delivered_at: DateTime<Utc>,
    window_days: i64,
    tz_offset_minutes: i32,
) -> DateTime<Utc> {
    let offset = FixedOffset::east_opt(tz_offset_minutes * 60)
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
    let local_date = delivered_at.with_timezone(&offset).date_naive() + ChronoDuration::days(window_days);
    let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).expect("valid time");
    local_date
        .and_time(end_of_day)
        .and_local_timezone(offset)
        .single()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or(delivered_at + ChronoDuration::days(window_days))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_is_inclusive_through_end_of_day() {
        // Delivered 2024-06-01 10:00 UTC, UTC business timezone, 7 days.
        let delivered = DateTime::parse_from_rfc3339("2024-06-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let deadline = return_deadline(delivered, 7, 0);

        let just_inside = DateTime::parse_from_rfc3339("2024-06-08T23:59:59Z")
            .unwrap()
            .with_timezone(&Utc);
        let just_outside = DateTime::parse_from_rfc3339("2024-06-09T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(just_inside <= deadline);
        assert!(just_outside > deadline);
    }

    #[test]
    fn deadline_respects_business_timezone() {
        // 20:00 UTC on June 1 is already June 2 in IST, pushing the window
        // a day further in UTC terms.
        let delivered = DateTime::parse_from_rfc3339("2024-06-01T20:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let utc_deadline = return_deadline(delivered, 7, 0);
        let ist_deadline = return_deadline(delivered, 7, 330);
        assert!(ist_deadline > utc_deadline);
    }
}
