//! Consumer return endpoints.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Json;
use loco_rs::app::AppContext;
use loco_rs::controller::Routes;
use uuid::Uuid;
use validator::Validate;

use kirana_orders::dto::return_request::{RequestReturnInput, ReturnResponse};

use crate::common::response::{created, ok, ApiResult};
use crate::extractors::auth::CurrentUser;
use crate::services::engine_from_context;

#[utoipa::path(
    post,
    path = "/api/returns",
    tag = "returns",
    request_body = RequestReturnInput,
    responses(
        (status = 201, description = "Return requested", body = ReturnResponse),
        (status = 409, description = "Return window closed")
    )
)]
async fn request_return(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Json(input): Json<RequestReturnInput>,
) -> ApiResult<Response> {
    input.validate()?;
    let engine = engine_from_context(&ctx)?;
    let request = engine.returns.request(user.id, input).await?;
    Ok(created("return requested", ReturnResponse::from(request)))
}

#[utoipa::path(
    get,
    path = "/api/returns",
    tag = "returns",
    responses((status = 200, description = "Return history", body = [ReturnResponse]))
)]
async fn list_returns(State(ctx): State<AppContext>, user: CurrentUser) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let returns = engine.returns.list_for_user(user.id).await?;
    let data: Vec<ReturnResponse> = returns.into_iter().map(ReturnResponse::from).collect();
    Ok(ok("returns", data))
}

#[utoipa::path(
    post,
    path = "/api/returns/{id}/cancel",
    tag = "returns",
    responses((status = 200, description = "Return cancelled", body = ReturnResponse))
)]
async fn cancel_return(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Path(return_id): Path<Uuid>,
) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let request = engine.returns.cancel(user.id, return_id).await?;
    Ok(ok("return cancelled", ReturnResponse::from(request)))
}

pub fn routes() -> Routes {
    Routes::new()
        .prefix("api/returns")
        .add("/", post(request_return))
        .add("/", get(list_returns))
        .add("/{id}/cancel", post(cancel_return))
}
