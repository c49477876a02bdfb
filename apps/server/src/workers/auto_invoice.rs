use kirana_orders::OrdersError;

use crate::services::Engine;

/// Generate invoices for delivered orders that have none yet.
pub async fn run_once(engine: &Engine, batch: u64) -> Result<String, OrdersError> {
    let generated = engine.invoices.auto_invoice(batch).await?;
    Ok(format!("generated={generated}"))
}
