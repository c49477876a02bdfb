use std::sync::Arc;

use sea_orm::ConnectionTrait;
use uuid::Uuid;

use kirana_core::events::{DomainEvent, EventEnvelope, EventTransport};
use kirana_core::{Error, Result};

use crate::transport::OutboxTransport;

#[derive(Clone)]
pub struct TransactionalEventBus {
    transport: Arc<dyn EventTransport>,
}

impl TransactionalEventBus {
    pub fn new(transport: Arc<dyn EventTransport>) -> Self {
        Self { transport }
    }

    /// Publish inside the caller's transaction: the event becomes durable
    /// iff the transaction commits.
    pub async fn publish_in_tx<C>(
        &self,
        txn: &C,
        actor_id: Option<Uuid>,
        event: DomainEvent,
    ) -> Result<()>
    where
        C: ConnectionTrait,
    {
        let envelope = self.validated(actor_id, event)?;

        if let Some(outbox) = self.transport.as_any().downcast_ref::<OutboxTransport>() {
            outbox.enqueue(txn, envelope).await?;
        } else {
            tracing::warn!(
                "event transport has no transactional write; event may be lost if the transaction fails"
            );
            self.transport.publish(envelope).await?;
        }

        Ok(())
    }

    pub async fn publish(&self, actor_id: Option<Uuid>, event: DomainEvent) -> Result<()> {
        let envelope = self.validated(actor_id, event)?;
        self.transport.publish(envelope).await
    }

    fn validated(&self, actor_id: Option<Uuid>, event: DomainEvent) -> Result<EventEnvelope> {
        event.validate().map_err(|e| {
            tracing::error!(event_type = event.event_type(), error = %e, "event validation failed");
            Error::Validation(format!("event validation failed: {e}"))
        })?;
        Ok(EventEnvelope::new(actor_id, event))
    }
}
