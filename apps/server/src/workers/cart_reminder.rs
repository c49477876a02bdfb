use kirana_orders::OrdersError;

use crate::services::Engine;

const MIN_IDLE_HOURS: i64 = 24;
const MAX_IDLE_HOURS: i64 = 72;

/// One reminder per abandoned-looking cart: idle between 24 h and 72 h,
/// owner known, not yet reminded.
pub async fn run_once(engine: &Engine, batch: u64) -> Result<String, OrdersError> {
    let candidates = engine
        .carts
        .reminder_candidates(MIN_IDLE_HOURS, MAX_IDLE_HOURS, batch)
        .await?;

    let mut sent = 0;
    for cart in candidates {
        let Some(user_id) = cart.user_id else { continue };
        if let Err(error) = engine.notifications.cart_reminder(user_id, cart.id).await {
            tracing::warn!(cart_id = %cart.id, %error, "cart reminder send failed");
            continue;
        }
        engine.carts.mark_reminder_sent(cart.id).await?;
        sent += 1;
    }
    Ok(format!("sent={sent}"))
}
