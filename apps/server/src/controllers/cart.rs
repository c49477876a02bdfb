//! Consumer cart endpoints. Work for both registered users (bearer token)
//! and guests (`X-Session-Id`).

use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::Json;
use loco_rs::app::AppContext;
use loco_rs::controller::Routes;
use uuid::Uuid;
use validator::Validate;

use kirana_orders::dto::cart::{AddItemInput, ApplyCouponInput, CartResponse, UpdateQuantityInput};
use kirana_orders::OrdersError;

use crate::common::response::{ok, ApiResult};
use crate::extractors::auth::CartPrincipal;
use crate::services::engine_from_context;

/// Fetch the active cart, refreshing prices and availability. Pricing or
/// catalog downtime degrades to the cached snapshot with no warnings
/// rather than failing the read.
#[utoipa::path(
    get,
    path = "/api/cart",
    tag = "cart",
    responses(
        (status = 200, description = "Active cart", body = CartResponse),
        (status = 401, description = "Unauthorized")
    )
)]
async fn get_cart(
    State(ctx): State<AppContext>,
    principal: CartPrincipal,
) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let owner = principal.owner();
    let cart = engine.carts.get_or_create_cart(&owner).await?;

    let warnings = match engine.revalidator.revalidate_cart(cart.id).await {
        Ok(report) => report.warnings,
        Err(OrdersError::PricingUnavailable) | Err(OrdersError::CatalogUnavailable) => {
            tracing::warn!(cart_id = %cart.id, "revalidation degraded to cached prices");
            Vec::new()
        }
        Err(error) => return Err(error.into()),
    };

    // Re-read: revalidation may have rewritten lines.
    let cart = engine.carts.get_or_create_cart(&owner).await?;
    let cart = engine.carts.recompute(cart.id).await?;
    let items = engine.carts.items_of(cart.id).await?;
    Ok(ok("cart", CartResponse::from_models(cart, items, warnings)))
}

#[utoipa::path(
    post,
    path = "/api/cart/items",
    tag = "cart",
    request_body = AddItemInput,
    responses(
        (status = 201, description = "Item added", body = CartResponse),
        (status = 400, description = "Validation error")
    )
)]
async fn add_item(
    State(ctx): State<AppContext>,
    principal: CartPrincipal,
    Json(input): Json<AddItemInput>,
) -> ApiResult<Response> {
    input.validate()?;
    let engine = engine_from_context(&ctx)?;
    let owner = principal.owner();
    let cart = engine.carts.add_item(&owner, input).await?;
    let items = engine.carts.items_of(cart.id).await?;
    Ok(crate::common::response::created(
        "item added",
        CartResponse::from_models(cart, items, Vec::new()),
    ))
}

#[utoipa::path(
    put,
    path = "/api/cart/items/{id}",
    tag = "cart",
    request_body = UpdateQuantityInput,
    responses((status = 200, description = "Quantity updated", body = CartResponse))
)]
async fn update_quantity(
    State(ctx): State<AppContext>,
    principal: CartPrincipal,
    Path(item_id): Path<Uuid>,
    Json(input): Json<UpdateQuantityInput>,
) -> ApiResult<Response> {
    input.validate()?;
    let engine = engine_from_context(&ctx)?;
    let owner = principal.owner();
    let cart = engine
        .carts
        .update_quantity(&owner, item_id, input.quantity)
        .await?;
    let items = engine.carts.items_of(cart.id).await?;
    Ok(ok(
        "quantity updated",
        CartResponse::from_models(cart, items, Vec::new()),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/cart/items/{id}",
    tag = "cart",
    responses((status = 200, description = "Item removed", body = CartResponse))
)]
async fn remove_item(
    State(ctx): State<AppContext>,
    principal: CartPrincipal,
    Path(item_id): Path<Uuid>,
) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let owner = principal.owner();
    let cart = engine.carts.remove_item(&owner, item_id).await?;
    let items = engine.carts.items_of(cart.id).await?;
    Ok(ok(
        "item removed",
        CartResponse::from_models(cart, items, Vec::new()),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    tag = "cart",
    responses((status = 200, description = "Cart cleared", body = CartResponse))
)]
async fn clear_cart(State(ctx): State<AppContext>, principal: CartPrincipal) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let owner = principal.owner();
    let cart = engine.carts.clear(&owner).await?;
    let items = engine.carts.items_of(cart.id).await?;
    Ok(ok(
        "cart cleared",
        CartResponse::from_models(cart, items, Vec::new()),
    ))
}

#[utoipa::path(
    post,
    path = "/api/cart/coupons",
    tag = "cart",
    request_body = ApplyCouponInput,
    responses(
        (status = 200, description = "Coupon applied", body = CartResponse),
        (status = 409, description = "Coupon already applied")
    )
)]
async fn apply_coupon(
    State(ctx): State<AppContext>,
    principal: CartPrincipal,
    Json(input): Json<ApplyCouponInput>,
) -> ApiResult<Response> {
    input.validate()?;
    let engine = engine_from_context(&ctx)?;
    let owner = principal.owner();
    let cart = engine.carts.apply_coupon(&owner, &input.code).await?;
    let items = engine.carts.items_of(cart.id).await?;
    Ok(ok(
        "coupon applied",
        CartResponse::from_models(cart, items, Vec::new()),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/cart/coupons/{code}",
    tag = "cart",
    responses((status = 200, description = "Coupon removed", body = CartResponse))
)]
async fn remove_coupon(
    State(ctx): State<AppContext>,
    principal: CartPrincipal,
    Path(code): Path<String>,
) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let owner = principal.owner();
    let cart = engine.carts.remove_coupon(&owner, &code).await?;
    let items = engine.carts.items_of(cart.id).await?;
    Ok(ok(
        "coupon removed",
        CartResponse::from_models(cart, items, Vec::new()),
    ))
}

pub fn routes() -> Routes {
    Routes::new()
        .prefix("api/cart")
        .add("/", get(get_cart))
        .add("/", delete(clear_cart))
        .add("/items", post(add_item))
        .add("/items/{id}", put(update_quantity))
        .add("/items/{id}", delete(remove_item))
        .add("/coupons", post(apply_coupon))
        .add("/coupons/{code}", delete(remove_coupon))
}
