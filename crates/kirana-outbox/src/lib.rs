//! Transactional outbox.
//!
//! Side effects of a state change (notifications, downstream syncs) must not
//! be lost if the process dies between the commit and the send. Services
//! publish through [`TransactionalEventBus`], which parks the envelope in
//! the `outbox_events` table inside the caller's transaction; the
//! [`OutboxRelay`] worker later leases due rows one at a time and delivers
//! them to the real transport, backing off on failure until the attempt
//! budget is spent and the row is parked as dead.

pub mod entity;
pub mod migration;
mod relay;
mod transactional;
mod transport;

pub use relay::{OutboxRelay, RelayTuning};
pub use transactional::TransactionalEventBus;
pub use transport::OutboxTransport;
