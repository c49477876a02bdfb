//! Payment verification, webhook ingestion and reconciliation.
//!
//! Money never depends on a single delivery path: the synchronous
//! verify-signature call, the webhook, and the periodic reconciliation loop
//! all converge on the same advance-only payment transitions, so whichever
//! arrives first wins and the rest become no-ops.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use tracing::instrument;
use uuid::Uuid;

use kirana_core::events::DomainEvent;
use kirana_core::generate_id;
use kirana_outbox::TransactionalEventBus;

use crate::clients::{GatewayPaymentStatus, PaymentGatewayClient};
use crate::dto::payment::{PaymentStatsResponse, ReconciliationStats, VerifySignatureInput, WebhookPayload};
use crate::entities::payment;
use crate::entities::payment::PaymentStatus;
use crate::error::{OrdersError, OrdersResult};
use crate::services::orders::{set_order_payment_status, Actor};
use crate::services::{EngineConfig, RefundService};
use crate::signature;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed,
    Duplicate,
    Ignored,
}

pub struct PaymentService {
    db: DatabaseConnection,
    events: TransactionalEventBus,
    gateway: Arc<dyn PaymentGatewayClient>,
    refunds: Arc<RefundService>,
    config: EngineConfig,
}

impl PaymentService {
    pub fn new(
        db: DatabaseConnection,
        events: TransactionalEventBus,
        gateway: Arc<dyn PaymentGatewayClient>,
        refunds: Arc<RefundService>,
        config: EngineConfig,
    ) -> Self {
        Self {
            db,
            events,
            gateway,
            refunds,
            config,
        }
    }

    pub async fn get(&self, payment_id: Uuid) -> OrdersResult<payment::Model> {
        payment::Entity::find_by_id(payment_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| OrdersError::not_found("Payment", payment_id))
    }

    pub async fn for_order(&self, order_id: Uuid) -> OrdersResult<Vec<payment::Model>> {
        Ok(payment::Entity::find()
            .filter(payment::Column::OrderId.eq(order_id))
            .all(&self.db)
            .await?)
    }

    /// Synchronous confirmation from the payment widget: check the HMAC,
    /// then advance the payment to `paid`. Replays are no-ops.
    #[instrument(skip(self, input))]
    pub async fn verify(
        &self,
        user_id: Uuid,
        input: VerifySignatureInput,
    ) -> OrdersResult<payment::Model> {
        if !signature::verify_payment_signature(
            &input.gateway_order_id,
            &input.gateway_payment_id,
            &input.signature,
            &self.config.gateway_secret,
        ) {
            return Err(OrdersError::InvalidSignature);
        }

        let row = payment::Entity::find()
            .filter(payment::Column::GatewayOrderId.eq(input.gateway_order_id.clone()))
            .one(&self.db)
            .await?
            .ok_or_else(|| OrdersError::not_found("Payment", &input.gateway_order_id))?;
        if row.user_id != user_id {
            return Err(OrdersError::Forbidden("payment belongs to another user".into()));
        }

        // Replay with the same payment id and a settled status: done already.
        if row.gateway_payment_id.as_deref() == Some(input.gateway_payment_id.as_str())
            && row.status.is_settled()
        {
            return Ok(row);
        }

        self.apply_gateway_result(
            row,
            PaymentStatus::Paid,
            Some(input.gateway_payment_id),
            Actor::customer(user_id),
        )
        .await
    }

    /// HMAC-checked webhook ingestion. Duplicate deliveries and unknown
    /// event types are acknowledged without mutation.
    #[instrument(skip(self, body, signature_header))]
    pub async fn handle_webhook(
        &self,
        body: &[u8],
        signature_header: &str,
    ) -> OrdersResult<WebhookOutcome> {
        if !signature::verify_webhook_signature(body, signature_header, &self.config.webhook_secret)
        {
            return Err(OrdersError::InvalidSignature);
        }

        let payload: WebhookPayload = serde_json::from_slice(body)
            .map_err(|e| OrdersError::validation(format!("malformed webhook body: {e}")))?;

        let target = match payload.event.as_str() {
            "payment.authorized" => PaymentStatus::Authorized,
            "payment.captured" => PaymentStatus::Paid,
            "payment.failed" => PaymentStatus::Failed,
            "refund.processed" => {
                return self.apply_refund_processed(&payload).await;
            }
            other => {
                tracing::debug!(event = other, "ignoring unknown webhook event");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        let row = self.find_by_gateway_ids(&payload).await?;
        let Some(row) = row else {
            tracing::warn!(
                gateway_payment_id = %payload.gateway_payment_id,
                "webhook for unknown payment"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        if row.status == target
            || (target == PaymentStatus::Paid && row.status.is_settled())
            || !row.status.can_transition_to(target)
        {
            return Ok(WebhookOutcome::Duplicate);
        }

        self.apply_gateway_result(
            row,
            target,
            Some(payload.gateway_payment_id.clone()),
            Actor::system(),
        )
        .await?;
        Ok(WebhookOutcome::Processed)
    }

    async fn apply_refund_processed(&self, payload: &WebhookPayload) -> OrdersResult<WebhookOutcome> {
        let Some(gateway_refund_id) = payload.gateway_refund_id.as_deref() else {
            return Ok(WebhookOutcome::Ignored);
        };
        match self.refunds.complete_by_gateway_id(gateway_refund_id).await {
            Ok(true) => Ok(WebhookOutcome::Processed),
            Ok(false) => Ok(WebhookOutcome::Duplicate),
            Err(OrdersError::NotFound { .. }) => Ok(WebhookOutcome::Ignored),
            Err(error) => Err(error),
        }
    }

    async fn find_by_gateway_ids(
        &self,
        payload: &WebhookPayload,
    ) -> OrdersResult<Option<payment::Model>> {
        let by_payment = payment::Entity::find()
            .filter(payment::Column::GatewayPaymentId.eq(payload.gateway_payment_id.clone()))
            .one(&self.db)
            .await?;
        if by_payment.is_some() {
            return Ok(by_payment);
        }
        if let Some(order_id) = &payload.gateway_order_id {
            return Ok(payment::Entity::find()
                .filter(payment::Column::GatewayOrderId.eq(order_id.clone()))
                .one(&self.db)
                .await?);
        }
        Ok(None)
    }

    /// Advance a payment and mirror the order's payment dimension.
    /// `paid_at` is set once and never overwritten.
    async fn apply_gateway_result(
        &self,
        row: payment::Model,
        target: PaymentStatus,
        gateway_payment_id: Option<String>,
        actor: Actor,
    ) -> OrdersResult<payment::Model> {
        if !row.status.can_transition_to(target) {
            return Err(OrdersError::invalid_state(format!(
                "payment cannot move from {} to {}",
                row.status.as_str(),
                target.as_str()
            )));
        }

        let now = Utc::now();
        let order_id = row.order_id;
        let payment_id = row.id;
        let amount = row.amount;
        let from = row.status;
        let had_paid_at = row.paid_at.is_some();

        let txn = self.db.begin().await?;
        let mut active: payment::ActiveModel = row.into();
        active.status = Set(target);
        if let Some(gateway_id) = gateway_payment_id {
            active.gateway_payment_id = Set(Some(gateway_id));
        }
        if matches!(target, PaymentStatus::Captured | PaymentStatus::Paid) && !had_paid_at {
            active.paid_at = Set(Some(now));
        }
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        crate::services::orders::append_history(
            &txn,
            order_id,
            crate::entities::status_history::HistoryKind::Payment,
            from.as_str(),
            target.as_str(),
            actor,
            None,
        )
        .await?;
        set_order_payment_status(&txn, order_id, target, actor).await?;

        let event = match target {
            PaymentStatus::Captured | PaymentStatus::Paid => DomainEvent::PaymentCaptured {
                payment_id,
                order_id,
                amount,
            },
            PaymentStatus::Failed => DomainEvent::PaymentFailed {
                payment_id,
                order_id,
            },
            _ => DomainEvent::OrderStatusChanged {
                order_id,
                from: from.as_str().to_string(),
                to: target.as_str().to_string(),
            },
        };
        self.events.publish_in_tx(&txn, actor.id, event).await?;
        txn.commit().await?;

        tracing::info!(
            payment_id = %payment_id,
            from = from.as_str(),
            to = target.as_str(),
            "payment transition applied"
        );
        Ok(updated)
    }

    /// Align local state with the gateway for payments stuck in flight.
    /// Remote status may only advance local; work is capped per run.
    #[instrument(skip(self))]
    pub async fn reconcile_pending(&self, limit: u64) -> OrdersResult<ReconciliationStats> {
        let window_start =
            Utc::now() - ChronoDuration::hours(self.config.reconciliation_window_hours);
        let in_flight = payment::Entity::find()
            .filter(payment::Column::Status.is_in([
                PaymentStatus::Pending,
                PaymentStatus::Initiated,
                PaymentStatus::Processing,
            ]))
            .filter(payment::Column::GatewayPaymentId.is_not_null())
            .filter(payment::Column::CreatedAt.gte(window_start))
            .limit(limit)
            .all(&self.db)
            .await?;

        let mut stats = ReconciliationStats {
            scanned: in_flight.len(),
            updated: 0,
            errors: 0,
        };

        for row in in_flight {
            let gateway_id = row
                .gateway_payment_id
                .clone()
                .expect("filtered on non-null gateway_payment_id");
            let remote = match self.gateway.fetch_payment(&gateway_id).await {
                Ok(remote) => remote,
                Err(error) => {
                    tracing::warn!(payment_id = %row.id, %error, "reconciliation fetch failed");
                    stats.errors += 1;
                    continue;
                }
            };

            let target = match remote.status {
                GatewayPaymentStatus::Captured => Some(PaymentStatus::Paid),
                GatewayPaymentStatus::Authorized => Some(PaymentStatus::Authorized),
                GatewayPaymentStatus::Failed => Some(PaymentStatus::Failed),
                GatewayPaymentStatus::Refunded => Some(PaymentStatus::Refunded),
                GatewayPaymentStatus::Created => None,
            };
            let Some(target) = target else { continue };

            if row.status == target || !row.status.can_transition_to(target) {
                continue;
            }
            match self
                .apply_gateway_result(row, target, None, Actor::system())
                .await
            {
                Ok(_) => stats.updated += 1,
                Err(error) => {
                    tracing::warn!(%error, "reconciliation apply failed");
                    stats.errors += 1;
                }
            }
        }

        tracing::info!(
            scanned = stats.scanned,
            updated = stats.updated,
            errors = stats.errors,
            "payment reconciliation pass complete"
        );
        Ok(stats)
    }

    /// Admin aggregate across all payments.
    pub async fn stats(&self) -> OrdersResult<PaymentStatsResponse> {
        let rows = payment::Entity::find().all(&self.db).await?;
        let mut by_status: HashMap<String, u64> = HashMap::new();
        let mut captured_amount = Decimal::ZERO;
        let mut refunded_amount = Decimal::ZERO;
        for row in &rows {
            *by_status.entry(row.status.as_str().to_string()).or_default() += 1;
            if row.status.is_settled() || row.status == PaymentStatus::Refunded {
                captured_amount += row.amount;
            }
            refunded_amount += row.refunded_amount;
        }
        Ok(PaymentStatsResponse {
            total_count: rows.len() as u64,
            by_status,
            captured_amount,
            refunded_amount,
        })
    }

    /// Record the payment row for a freshly materialized order.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn insert_initiated<C: sea_orm::ConnectionTrait>(
        conn: &C,
        order_id: Uuid,
        user_id: Uuid,
        amount: Decimal,
        currency: &str,
        gateway_order_id: &str,
        method: &str,
        method_details: serde_json::Value,
    ) -> OrdersResult<payment::Model> {
        let now = Utc::now();
        let model = payment::ActiveModel {
            id: Set(generate_id()),
            order_id: Set(order_id),
            user_id: Set(user_id),
            amount: Set(amount),
            currency: Set(currency.to_string()),
            gateway_order_id: Set(Some(gateway_order_id.to_string())),
            gateway_payment_id: Set(None),
            method: Set(method.to_string()),
            method_details: Set(method_details),
            status: Set(PaymentStatus::Initiated),
            refunded_amount: Set(Decimal::ZERO),
            paid_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Ok(model.insert(conn).await?)
    }
}
