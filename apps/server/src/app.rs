use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router as AxumRouter;
use loco_rs::{
    app::{AppContext, Hooks, Initializer},
    boot::{create_app, BootResult, StartMode},
    config::Config,
    controller::AppRoutes,
    environment::Environment,
    task::Tasks,
    Result,
};
use tokio::task::JoinHandle;

use kirana_core::events::MemoryTransport;
use kirana_outbox::OutboxRelay;
use migration::Migrator;

use crate::controllers;
use crate::services::engine_from_context;
use crate::workers;

struct BackgroundWorkerHandles {
    _handles: Vec<JoinHandle<()>>,
}

pub struct App;

#[async_trait]
impl Hooks for App {
    fn app_name() -> &'static str {
        env!("CARGO_PKG_NAME")
    }

    fn app_version() -> String {
        format!(
            "{} ({})",
            env!("CARGO_PKG_VERSION"),
            option_env!("BUILD_SHA").unwrap_or("dev")
        )
    }

    async fn boot(
        mode: StartMode,
        environment: &Environment,
        config: Config,
    ) -> Result<BootResult> {
        create_app::<Self, Migrator>(mode, environment, config).await
    }

    fn routes(_ctx: &AppContext) -> AppRoutes {
        AppRoutes::with_default_routes()
            .add_route(controllers::health::routes())
            .add_route(controllers::cart::routes())
            .add_route(controllers::checkout::routes())
            .add_route(controllers::orders::routes())
            .add_route(controllers::payments::routes())
            .add_route(controllers::refunds::routes())
            .add_route(controllers::returns::routes())
            .add_route(controllers::invoices::routes())
            .add_route(controllers::internal::routes())
            .add_route(controllers::admin::routes())
    }

    async fn after_routes(router: AxumRouter, ctx: &AppContext) -> Result<AxumRouter> {
        // Build the engine once so the first request doesn't pay for it.
        engine_from_context(ctx)?;
        Ok(router)
    }

    async fn truncate(_ctx: &AppContext) -> Result<()> {
        Ok(())
    }

    fn register_tasks(_tasks: &mut Tasks) {}

    async fn initializers(_ctx: &AppContext) -> Result<Vec<Box<dyn Initializer>>> {
        Ok(vec![])
    }

    async fn connect_workers(ctx: &AppContext, _queue: &loco_rs::prelude::Queue) -> Result<()> {
        if ctx.shared_store.contains::<BackgroundWorkerHandles>() {
            return Ok(());
        }

        let engine = engine_from_context(ctx)?;
        let mut handles = Vec::new();

        // Outbox relay: drains committed events to the downstream transport.
        let relay = OutboxRelay::new(
            ctx.db.clone(),
            Arc::new(MemoryTransport::new()),
            engine.settings.outbox.relay_tuning(),
        );
        let idle = Duration::from_millis(engine.settings.outbox.relay_idle_ms);
        handles.push(tokio::spawn(async move {
            loop {
                match relay.drain_once().await {
                    Ok(0) => tokio::time::sleep(idle).await,
                    Ok(_) => {}
                    Err(error) => {
                        tracing::error!(%error, "outbox relay pass failed");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }));

        if engine.settings.workers.enabled {
            handles.extend(workers::spawn_all(engine));
        }

        ctx.shared_store
            .insert(BackgroundWorkerHandles { _handles: handles });
        Ok(())
    }

    async fn seed(_ctx: &AppContext, _path: &Path) -> Result<()> {
        Ok(())
    }
}
