use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::id::generate_id;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    CartUpdated {
        cart_id: Uuid,
        item_count: i32,
        grand_total: Decimal,
    },
    CartMerged {
        guest_cart_id: Uuid,
        user_cart_id: Uuid,
        user_id: Uuid,
    },
    CartReminderDue {
        cart_id: Uuid,
        user_id: Option<Uuid>,
    },
    CheckoutStarted {
        session_id: Uuid,
        cart_id: Uuid,
        grand_total: Decimal,
    },
    CheckoutExpired {
        session_id: Uuid,
        cart_id: Uuid,
    },
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        user_id: Uuid,
        grand_total: Decimal,
    },
    OrderStatusChanged {
        order_id: Uuid,
        from: String,
        to: String,
    },
    OrderCancelled {
        order_id: Uuid,
        reason: String,
    },
    PaymentCaptured {
        payment_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
    },
    PaymentFailed {
        payment_id: Uuid,
        order_id: Uuid,
    },
    RefundRequested {
        refund_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
    },
    RefundCompleted {
        refund_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
    },
    ReturnRequested {
        return_id: Uuid,
        order_id: Uuid,
    },
    ReturnStatusChanged {
        return_id: Uuid,
        from: String,
        to: String,
    },
    InvoiceGenerated {
        invoice_id: Uuid,
        order_id: Uuid,
        invoice_number: String,
    },
    StoreCreditIssued {
        user_id: Uuid,
        refund_id: Uuid,
        amount: Decimal,
    },
}

impl DomainEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::CartUpdated { .. } => "cart.updated",
            DomainEvent::CartMerged { .. } => "cart.merged",
            DomainEvent::CartReminderDue { .. } => "cart.reminder_due",
            DomainEvent::CheckoutStarted { .. } => "checkout.started",
            DomainEvent::CheckoutExpired { .. } => "checkout.expired",
            DomainEvent::OrderCreated { .. } => "order.created",
            DomainEvent::OrderStatusChanged { .. } => "order.status_changed",
            DomainEvent::OrderCancelled { .. } => "order.cancelled",
            DomainEvent::PaymentCaptured { .. } => "payment.captured",
            DomainEvent::PaymentFailed { .. } => "payment.failed",
            DomainEvent::RefundRequested { .. } => "refund.requested",
            DomainEvent::RefundCompleted { .. } => "refund.completed",
            DomainEvent::ReturnRequested { .. } => "return.requested",
            DomainEvent::ReturnStatusChanged { .. } => "return.status_changed",
            DomainEvent::InvoiceGenerated { .. } => "invoice.generated",
            DomainEvent::StoreCreditIssued { .. } => "store_credit.issued",
        }
    }

    pub fn schema_version(&self) -> i16 {
        1
    }

    /// Reject events that would be meaningless to a consumer.
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            DomainEvent::CartUpdated { item_count, .. } if *item_count < 0 => {
                Err("item_count cannot be negative".into())
            }
            DomainEvent::OrderCreated { order_number, .. } if order_number.is_empty() => {
                Err("order_number cannot be empty".into())
            }
            DomainEvent::PaymentCaptured { amount, .. }
            | DomainEvent::RefundRequested { amount, .. }
            | DomainEvent::RefundCompleted { amount, .. }
            | DomainEvent::StoreCreditIssued { amount, .. }
                if amount.is_sign_negative() =>
            {
                Err("amount cannot be negative".into())
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub event_type: String,
    pub schema_version: i16,
    pub actor_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
    pub event: DomainEvent,
}

impl EventEnvelope {
    pub fn new(actor_id: Option<Uuid>, event: DomainEvent) -> Self {
        Self {
            id: generate_id(),
            event_type: event.event_type().to_string(),
            schema_version: event.schema_version(),
            actor_id,
            occurred_at: Utc::now(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn envelope_carries_event_type() {
        let envelope = EventEnvelope::new(
            None,
            DomainEvent::OrderCreated {
                order_id: generate_id(),
                order_number: "ORD-2026-000001".to_string(),
                user_id: generate_id(),
                grand_total: dec!(548.00),
            },
        );
        assert_eq!(envelope.event_type, "order.created");
        assert_eq!(envelope.schema_version, 1);
    }

    #[test]
    fn negative_amount_fails_validation() {
        let event = DomainEvent::PaymentCaptured {
            payment_id: generate_id(),
            order_id: generate_id(),
            amount: dec!(-1),
        };
        assert!(event.validate().is_err());
    }
}
