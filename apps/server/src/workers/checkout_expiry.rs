use kirana_orders::OrdersError;

use crate::services::Engine;

/// Expire overdue checkout sessions and release their reservations.
pub async fn run_once(engine: &Engine, batch: u64) -> Result<String, OrdersError> {
    let expired = engine.checkout.expire_stale(batch).await?;
    Ok(format!("expired={expired}"))
}
