use kirana_orders::OrdersError;

use crate::services::Engine;

/// Flip long-idle carts to abandoned, then hard-delete abandoned carts
/// past the retention window.
pub async fn run_once(engine: &Engine, batch: u64) -> Result<String, OrdersError> {
    let idle_days = engine.settings.engine.cart_expiry_days;
    let abandoned = engine.carts.mark_abandoned(idle_days, batch).await?;
    let purged = engine.carts.purge_abandoned(idle_days, batch).await?;
    Ok(format!("abandoned={abandoned} purged={purged}"))
}
