//! Liveness/readiness probes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Json;
use loco_rs::app::AppContext;
use loco_rs::controller::Routes;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    app: &'static str,
    version: &'static str,
}

async fn health() -> Response {
    Json(HealthResponse {
        status: "ok",
        app: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
    .into_response()
}

async fn live() -> Response {
    StatusCode::OK.into_response()
}

async fn ready(State(ctx): State<AppContext>) -> Response {
    match ctx.db.ping().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(error) => {
            tracing::error!(%error, "database unreachable");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

pub fn routes() -> Routes {
    Routes::new()
        .prefix("health")
        .add("/", get(health))
        .add("/live", get(live))
        .add("/ready", get(ready))
}
