//! Consumer order endpoints.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Json;
use loco_rs::app::AppContext;
use loco_rs::controller::Routes;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use uuid::Uuid;
use validator::Validate;

use kirana_orders::dto::order::{CancelOrderInput, OrderListItem, OrderResponse};
use kirana_orders::entities::order;
use kirana_orders::services::Actor;

use crate::common::pagination::{PaginatedResponse, PaginationMeta, PaginationParams};
use crate::common::response::{ok, ApiResult};
use crate::extractors::auth::CurrentUser;
use crate::services::engine_from_context;

#[utoipa::path(
    get,
    path = "/api/orders",
    tag = "orders",
    params(PaginationParams),
    responses((status = 200, description = "Order history", body = PaginatedResponse<OrderListItem>))
)]
async fn list_orders(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Response> {
    let query = order::Entity::find().filter(order::Column::UserId.eq(user.id));
    let total = query.clone().count(&ctx.db).await.map_err(map_db)?;
    let rows = query
        .order_by_desc(order::Column::CreatedAt)
        .offset(pagination.offset())
        .limit(pagination.limit())
        .all(&ctx.db)
        .await
        .map_err(map_db)?;

    let items: Vec<OrderListItem> = rows.into_iter().map(OrderListItem::from_model).collect();
    Ok(ok(
        "orders",
        PaginatedResponse {
            data: items,
            meta: PaginationMeta::new(pagination.page, pagination.limit(), total),
        },
    ))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    tag = "orders",
    responses(
        (status = 200, description = "Order detail", body = OrderResponse),
        (status = 404, description = "Not found")
    )
)]
async fn get_order(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let order = engine.orders.get_owned(order_id, user.id).await?;
    let items = engine.orders.items_of(order_id).await?;
    let history = engine.orders.history_of(order_id).await?;
    Ok(ok("order", OrderResponse::from_models(order, items, history)?))
}

/// Customer cancellation; only pending/confirmed orders qualify.
#[utoipa::path(
    post,
    path = "/api/orders/{id}/cancel",
    tag = "orders",
    request_body = CancelOrderInput,
    responses(
        (status = 200, description = "Order cancelled", body = OrderResponse),
        (status = 409, description = "Not cancellable in current state")
    )
)]
async fn cancel_order(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<CancelOrderInput>,
) -> ApiResult<Response> {
    input.validate()?;
    let engine = engine_from_context(&ctx)?;
    // Ownership check before any mutation.
    engine.orders.get_owned(order_id, user.id).await?;
    let order = engine
        .orders
        .cancel(
            order_id,
            input.reason,
            input.note,
            Actor::customer(user.id),
            false,
        )
        .await?;
    let items = engine.orders.items_of(order_id).await?;
    let history = engine.orders.history_of(order_id).await?;
    Ok(ok("order cancelled", OrderResponse::from_models(order, items, history)?))
}

fn map_db(err: sea_orm::DbErr) -> crate::common::response::ApiFailure {
    kirana_orders::OrdersError::Database(err).into()
}

pub fn routes() -> Routes {
    Routes::new()
        .prefix("api/orders")
        .add("/", get(list_orders))
        .add("/{id}", get(get_order))
        .add("/{id}/cancel", post(cancel_order))
}
