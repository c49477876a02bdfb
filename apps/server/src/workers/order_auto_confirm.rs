use kirana_orders::OrdersError;

use crate::services::Engine;

/// Confirm paid orders that sat in pending past the auto-confirm window.
pub async fn run_once(engine: &Engine, batch: u64) -> Result<String, OrdersError> {
    let confirmed = engine.orders.auto_confirm(batch).await?;
    Ok(format!("confirmed={confirmed}"))
}
