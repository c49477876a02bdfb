use kirana_orders::OrdersError;

use crate::services::Engine;

/// Align in-flight payments with the gateway's view of them.
pub async fn run_once(engine: &Engine, batch: u64) -> Result<String, OrdersError> {
    let stats = engine.payments.reconcile_pending(batch).await?;
    Ok(format!(
        "scanned={} updated={} errors={}",
        stats.scanned, stats.updated, stats.errors
    ))
}
