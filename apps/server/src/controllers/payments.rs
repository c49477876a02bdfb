//! Payment endpoints: synchronous signature verification and the gateway
//! webhook (HMAC over the raw body, no bearer auth).

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::post;
use axum::Json;
use loco_rs::app::AppContext;
use loco_rs::controller::Routes;
use validator::Validate;

use kirana_orders::dto::payment::{PaymentResponse, VerifySignatureInput};
use kirana_orders::services::WebhookOutcome;

use crate::common::response::{ok, ApiFailure, ApiResult};
use crate::extractors::auth::CurrentUser;
use crate::services::engine_from_context;

#[utoipa::path(
    post,
    path = "/api/payments/verify-signature",
    tag = "payments",
    request_body = VerifySignatureInput,
    responses(
        (status = 200, description = "Payment verified", body = PaymentResponse),
        (status = 401, description = "Invalid signature")
    )
)]
async fn verify_signature(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Json(input): Json<VerifySignatureInput>,
) -> ApiResult<Response> {
    input.validate()?;
    let engine = engine_from_context(&ctx)?;
    let payment = engine.payments.verify(user.id, input).await?;
    Ok(ok("payment verified", PaymentResponse::from(payment)))
}

async fn webhook(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let signature = headers
        .get("X-Signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiFailure::unauthorized("missing X-Signature header"))?;

    let engine = engine_from_context(&ctx)?;
    let outcome = engine.payments.handle_webhook(&body, signature).await?;
    let message = match outcome {
        WebhookOutcome::Processed => "processed",
        WebhookOutcome::Duplicate => "duplicate",
        WebhookOutcome::Ignored => "ignored",
    };
    Ok(ok(message, serde_json::json!({ "outcome": message })))
}

pub fn routes() -> Routes {
    Routes::new()
        .prefix("api")
        .add("/payments/verify-signature", post(verify_signature))
        .add("/webhooks/payment-gateway", post(webhook))
}
