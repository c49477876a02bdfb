//! Checkout endpoints: open a session over the active cart, inspect it,
//! and complete it into an order plus a gateway hand-off.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Json;
use loco_rs::app::AppContext;
use loco_rs::controller::Routes;
use uuid::Uuid;
use validator::Validate;

use kirana_orders::dto::checkout::{
    CheckoutCompletionResponse, CheckoutSessionResponse, InitiateCheckoutInput,
};

use crate::common::response::{created, ok, ApiResult};
use crate::extractors::auth::CurrentUser;
use crate::services::engine_from_context;

#[utoipa::path(
    post,
    path = "/api/checkout",
    tag = "checkout",
    request_body = InitiateCheckoutInput,
    responses(
        (status = 201, description = "Checkout session opened", body = CheckoutSessionResponse),
        (status = 400, description = "Cart invalid or address not serviceable"),
        (status = 409, description = "Stock unavailable"),
        (status = 503, description = "Collaborator unavailable")
    )
)]
async fn initiate(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Json(input): Json<InitiateCheckoutInput>,
) -> ApiResult<Response> {
    input.validate()?;
    let engine = engine_from_context(&ctx)?;
    let session = engine.checkout.initiate(user.id, input).await?;
    Ok(created(
        "checkout session opened",
        CheckoutSessionResponse::from_model(session)?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/checkout/{id}",
    tag = "checkout",
    responses((status = 200, description = "Checkout session", body = CheckoutSessionResponse))
)]
async fn get_session(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let session = engine.checkout.get_owned(session_id, user.id).await?;
    Ok(ok("checkout session", CheckoutSessionResponse::from_model(session)?))
}

#[utoipa::path(
    post,
    path = "/api/checkout/{id}/complete",
    tag = "checkout",
    responses(
        (status = 200, description = "Order created, gateway hand-off", body = CheckoutCompletionResponse),
        (status = 409, description = "Session expired or totals drifted"),
        (status = 503, description = "Payment gateway unavailable")
    )
)]
async fn complete(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let completion = engine
        .checkout
        .complete(user.id, session_id, user.contact())
        .await?;
    Ok(ok("order created", completion))
}

pub fn routes() -> Routes {
    Routes::new()
        .prefix("api/checkout")
        .add("/", post(initiate))
        .add("/{id}", get(get_session))
        .add("/{id}/complete", post(complete))
}
