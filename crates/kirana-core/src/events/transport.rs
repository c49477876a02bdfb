use std::any::Any;

use async_trait::async_trait;
use uuid::Uuid;

use super::EventEnvelope;
use crate::Result;

/// What a transport promises about delivery once `publish` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReliabilityLevel {
    /// Lost on process death. Test and dev only.
    BestEffort,
    /// Durable in the same datastore as the state change.
    Outbox,
}

#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn publish(&self, envelope: EventEnvelope) -> Result<()>;

    async fn publish_batch(&self, envelopes: Vec<EventEnvelope>) -> Result<()> {
        for envelope in envelopes {
            self.publish(envelope).await?;
        }
        Ok(())
    }

    async fn acknowledge(&self, _event_id: Uuid) -> Result<()> {
        Ok(())
    }

    fn reliability_level(&self) -> ReliabilityLevel;

    /// Concrete-type escape hatch so the transactional bus can detect an
    /// outbox transport and write through the caller's transaction.
    fn as_any(&self) -> &dyn Any;
}
