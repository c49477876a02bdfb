pub mod cart;
pub mod checkout;
pub mod invoices;
pub mod orders;
pub mod payments;
pub mod refunds;
pub mod returns;
pub mod revalidation;
pub mod sequence;

pub use cart::CartService;
pub use checkout::CheckoutService;
pub use invoices::InvoiceService;
pub use orders::{Actor, OrderService};
pub use payments::{PaymentService, WebhookOutcome};
pub use refunds::RefundService;
pub use returns::ReturnService;
pub use revalidation::{RevalidationReport, RevalidationService};

use std::time::Duration;

/// Engine policy knobs, loaded from the application settings. Defaults
/// mirror the documented environment contract.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub gateway_secret: String,
    pub webhook_secret: String,
    pub cart_expiry_days: i64,
    pub checkout_expiry: Duration,
    pub reservation_ttl: Duration,
    pub payment_timeout: Duration,
    pub return_window_days: i64,
    pub order_auto_confirm_hours: i64,
    pub reconciliation_window_hours: i64,
    pub max_items_per_cart: usize,
    pub max_quantity_per_line: i32,
    /// Local business timezone as minutes east of UTC (IST = +330). Drives
    /// the return-window day boundary and the daily cleanup fire time.
    pub tz_offset_minutes: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gateway_secret: String::new(),
            webhook_secret: String::new(),
            cart_expiry_days: 30,
            checkout_expiry: Duration::from_secs(30 * 60),
            reservation_ttl: Duration::from_secs(30 * 60),
            payment_timeout: Duration::from_secs(15 * 60),
            return_window_days: 7,
            order_auto_confirm_hours: 6,
            reconciliation_window_hours: 48,
            max_items_per_cart: 50,
            max_quantity_per_line: 10,
            tz_offset_minutes: 330,
        }
    }
}
