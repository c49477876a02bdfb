use std::any::Any;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{EventEnvelope, EventTransport, ReliabilityLevel};
use crate::Result;

/// In-process transport. Records everything it is given; used in tests and
/// as the dev-mode relay target.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    published: Arc<Mutex<Vec<EventEnvelope>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<EventEnvelope> {
        self.published.lock().expect("transport lock poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.published.lock().expect("transport lock poisoned").len()
    }

    pub fn of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.published
            .lock()
            .expect("transport lock poisoned")
            .iter()
            .filter(|envelope| envelope.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.published.lock().expect("transport lock poisoned").clear();
    }
}

#[async_trait]
impl EventTransport for MemoryTransport {
    async fn publish(&self, envelope: EventEnvelope) -> Result<()> {
        tracing::debug!(event_type = %envelope.event_type, "event published (memory)");
        self.published
            .lock()
            .expect("transport lock poisoned")
            .push(envelope);
        Ok(())
    }

    fn reliability_level(&self) -> ReliabilityLevel {
        ReliabilityLevel::BestEffort
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DomainEvent;
    use crate::id::generate_id;

    #[tokio::test]
    async fn records_published_events() {
        let transport = MemoryTransport::new();
        transport
            .publish(EventEnvelope::new(
                None,
                DomainEvent::CartReminderDue {
                    cart_id: generate_id(),
                    user_id: None,
                },
            ))
            .await
            .unwrap();

        assert_eq!(transport.count(), 1);
        assert_eq!(transport.of_type("cart.reminder_due").len(), 1);
    }
}
