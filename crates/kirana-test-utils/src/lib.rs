//! Test utilities: in-memory sqlite databases with migrations applied, a
//! recording event transport, and scriptable mock collaborators.

pub mod clients;
pub mod db;
pub mod events;

pub use clients::{
    MockCatalogClient, MockGatewayClient, MockInventoryClient, MockInvoiceRenderer,
    MockNotificationClient, MockPricingClient, MockShippingClient,
};
pub use db::setup_test_db;
pub use events::{mock_transactional_event_bus, recording_event_bus};
