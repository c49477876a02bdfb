//! Consumer refund endpoints.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Json;
use loco_rs::app::AppContext;
use loco_rs::controller::Routes;
use uuid::Uuid;
use validator::Validate;

use kirana_orders::dto::refund::{RefundResponse, RequestRefundInput};

use crate::common::response::{created, ok, ApiResult};
use crate::extractors::auth::CurrentUser;
use crate::services::engine_from_context;

#[utoipa::path(
    post,
    path = "/api/refunds",
    tag = "refunds",
    request_body = RequestRefundInput,
    responses(
        (status = 201, description = "Refund requested", body = RefundResponse),
        (status = 400, description = "Quantity exceeds refundable remainder")
    )
)]
async fn request_refund(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Json(input): Json<RequestRefundInput>,
) -> ApiResult<Response> {
    input.validate()?;
    let engine = engine_from_context(&ctx)?;
    let refund = engine.refunds.request(user.id, input).await?;
    Ok(created("refund requested", RefundResponse::from(refund)))
}

#[utoipa::path(
    get,
    path = "/api/refunds",
    tag = "refunds",
    responses((status = 200, description = "Refund history", body = [RefundResponse]))
)]
async fn list_refunds(State(ctx): State<AppContext>, user: CurrentUser) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let refunds = engine.refunds.list_for_user(user.id).await?;
    let data: Vec<RefundResponse> = refunds.into_iter().map(RefundResponse::from).collect();
    Ok(ok("refunds", data))
}

#[utoipa::path(
    post,
    path = "/api/refunds/{id}/cancel",
    tag = "refunds",
    responses((status = 200, description = "Refund cancelled", body = RefundResponse))
)]
async fn cancel_refund(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Path(refund_id): Path<Uuid>,
) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let refund = engine.refunds.cancel(user.id, refund_id).await?;
    Ok(ok("refund cancelled", RefundResponse::from(refund)))
}

pub fn routes() -> Routes {
    Routes::new()
        .prefix("api/refunds")
        .add("/", post(request_refund))
        .add("/", get(list_refunds))
        .add("/{id}/cancel", post(cancel_refund))
}
