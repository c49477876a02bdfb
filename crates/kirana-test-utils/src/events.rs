use std::sync::Arc;

use kirana_core::events::MemoryTransport;
use kirana_outbox::TransactionalEventBus;

/// Event bus backed by the recording memory transport.
pub fn mock_transactional_event_bus() -> TransactionalEventBus {
    TransactionalEventBus::new(Arc::new(MemoryTransport::new()))
}

/// Same, but hands back the transport so tests can assert on what was
/// published.
pub fn recording_event_bus() -> (TransactionalEventBus, Arc<MemoryTransport>) {
    let transport = Arc::new(MemoryTransport::new());
    (TransactionalEventBus::new(transport.clone()), transport)
}
