use kirana_orders::OrdersError;

use crate::services::Engine;

const STALE_HOURS: i64 = 6;

/// Background price/availability pass over active carts. Collaborator
/// downtime skips the run; the next tick retries.
pub async fn run_once(engine: &Engine, batch: u64) -> Result<String, OrdersError> {
    let cart_ids = engine.carts.revalidation_candidates(STALE_HOURS, batch).await?;

    let mut checked = 0;
    let mut repriced = 0;
    for cart_id in cart_ids {
        match engine.revalidator.revalidate_cart(cart_id).await {
            Ok(report) => {
                checked += 1;
                repriced += report.price_changes.len();
                if !report.is_clean() {
                    engine.carts.recompute(cart_id).await?;
                }
            }
            Err(OrdersError::PricingUnavailable) | Err(OrdersError::CatalogUnavailable) => {
                return Ok(format!("checked={checked} repriced={repriced} (upstream down, stopped early)"));
            }
            Err(error) => return Err(error),
        }
    }
    Ok(format!("checked={checked} repriced={repriced}"))
}
