//! Background loops (C6): cart cleanup, checkout expiry, reminders,
//! auto-confirm, payment reconciliation, auto-invoice, cart revalidation.
//!
//! Each worker is one cooperative task driven by a shared periodic
//! harness: an interval tick, an in-process running flag against
//! overlapping runs, and a bounded batch per run.

mod auto_invoice;
mod cart_cleanup;
mod cart_reminder;
mod cart_revalidation;
mod checkout_expiry;
mod order_auto_confirm;
mod payment_reconciliation;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, NaiveTime, Utc};
use tokio::task::JoinHandle;

use crate::services::Engine;

pub fn spawn_all(engine: Engine) -> Vec<JoinHandle<()>> {
    let batch = engine.settings.workers.batch_size;
    vec![
        spawn_daily_at(
            "cart-cleanup",
            2,
            engine.settings.engine.tz_offset_minutes,
            engine.clone(),
            move |engine| async move { cart_cleanup::run_once(&engine, batch).await },
        ),
        spawn_periodic(
            "checkout-expiry",
            Duration::from_secs(60 * 60),
            engine.clone(),
            move |engine| async move { checkout_expiry::run_once(&engine, batch).await },
        ),
        spawn_periodic(
            "abandoned-cart-reminder",
            Duration::from_secs(6 * 60 * 60),
            engine.clone(),
            move |engine| async move { cart_reminder::run_once(&engine, batch).await },
        ),
        spawn_periodic(
            "order-auto-confirm",
            Duration::from_secs(2 * 60 * 60),
            engine.clone(),
            move |engine| async move { order_auto_confirm::run_once(&engine, batch).await },
        ),
        spawn_periodic(
            "payment-reconciliation",
            Duration::from_secs(4 * 60 * 60),
            engine.clone(),
            move |engine| async move { payment_reconciliation::run_once(&engine, batch).await },
        ),
        spawn_periodic(
            "auto-invoice",
            Duration::from_secs(6 * 60 * 60),
            engine.clone(),
            move |engine| async move { auto_invoice::run_once(&engine, batch).await },
        ),
        spawn_periodic(
            "cart-item-validation",
            Duration::from_secs(6 * 60 * 60),
            engine,
            move |engine| async move { cart_revalidation::run_once(&engine, batch).await },
        ),
    ]
}

fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    engine: Engine,
    run: F,
) -> JoinHandle<()>
where
    F: Fn(Engine) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, kirana_orders::OrdersError>> + Send,
{
    let running = Arc::new(AtomicBool::new(false));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Skip the immediate first tick.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            run_guarded(name, &running, run(engine.clone())).await;
        }
    })
}

/// Fire once a day at `hour` o'clock in the business timezone.
fn spawn_daily_at<F, Fut>(
    name: &'static str,
    hour: u32,
    tz_offset_minutes: i32,
    engine: Engine,
    run: F,
) -> JoinHandle<()>
where
    F: Fn(Engine) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, kirana_orders::OrdersError>> + Send,
{
    let running = Arc::new(AtomicBool::new(false));
    tokio::spawn(async move {
        loop {
            let wait = until_next_local(hour, tz_offset_minutes);
            tokio::time::sleep(wait).await;
            run_guarded(name, &running, run(engine.clone())).await;
        }
    })
}

async fn run_guarded<Fut>(name: &'static str, running: &AtomicBool, fut: Fut)
where
    Fut: Future<Output = Result<String, kirana_orders::OrdersError>>,
{
    if running.swap(true, Ordering::SeqCst) {
        tracing::warn!(worker = name, "previous run still active, skipping");
        return;
    }
    match fut.await {
        Ok(summary) => tracing::info!(worker = name, %summary, "worker run complete"),
        Err(error) => tracing::error!(worker = name, %error, "worker run failed"),
    }
    running.store(false, Ordering::SeqCst);
}

fn until_next_local(hour: u32, tz_offset_minutes: i32) -> Duration {
    let offset = FixedOffset::east_opt(tz_offset_minutes * 60)
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
    let now = Utc::now().with_timezone(&offset);
    let fire_time = NaiveTime::from_hms_opt(hour, 0, 0).expect("valid hour");
    let mut next = now.date_naive().and_time(fire_time);
    if next <= now.naive_local() {
        next += chrono::Duration::days(1);
    }
    let wait = next - now.naive_local();
    wait.to_std().unwrap_or(Duration::from_secs(60 * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_fire_time_is_within_a_day() {
        let wait = until_next_local(2, 330);
        assert!(wait <= Duration::from_secs(24 * 60 * 60));
    }
}
