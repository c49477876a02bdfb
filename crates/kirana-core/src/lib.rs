pub mod error;
pub mod events;
pub mod id;
pub mod money;

pub use error::{Error, Result};
pub use events::{DomainEvent, EventEnvelope, EventTransport, MemoryTransport, ReliabilityLevel};
pub use id::{generate_id, parse_id};
pub use money::{paise, round_money, Money, CURRENCY_INR};
