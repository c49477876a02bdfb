//! Admin surface: order management, refund approval pipeline, return
//! pickup/inspection, invoice generation, payment stats.

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::Json;
use loco_rs::app::AppContext;
use loco_rs::controller::Routes;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use kirana_orders::dto::order::{OrderListItem, OrderResponse, UpdateOrderStatusInput};
use kirana_orders::dto::refund::{ApproveRefundInput, RefundResponse};
use kirana_orders::dto::return_request::{InspectReturnInput, ReturnResponse, SchedulePickupInput};
use kirana_orders::dto::invoice::InvoiceResponse;
use kirana_orders::dto::payment::PaymentStatsResponse;
use kirana_orders::entities::order;
use kirana_orders::entities::order::OrderStatus;
use kirana_orders::services::orders::TransitionExtras;
use kirana_orders::services::Actor;
use kirana_orders::OrdersError;

use crate::common::pagination::{PaginatedResponse, PaginationMeta, PaginationParams};
use crate::common::response::{ok, ApiResult};
use crate::extractors::auth::AdminUser;
use crate::services::engine_from_context;

#[derive(Debug, Deserialize)]
struct ListOrdersParams {
    #[serde(flatten)]
    pagination: Option<PaginationParams>,
    status: Option<String>,
    user_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    tag = "admin",
    responses((status = 200, description = "Orders across all users", body = PaginatedResponse<OrderListItem>))
)]
async fn list_orders(
    State(ctx): State<AppContext>,
    AdminUser(_admin): AdminUser,
    Query(params): Query<ListOrdersParams>,
) -> ApiResult<Response> {
    let pagination = params.pagination.unwrap_or_default();
    let mut query = order::Entity::find();
    if let Some(status) = &params.status {
        query = query.filter(order::Column::Status.eq(status.clone()));
    }
    if let Some(user_id) = params.user_id {
        query = query.filter(order::Column::UserId.eq(user_id));
    }

    let total = query
        .clone()
        .count(&ctx.db)
        .await
        .map_err(OrdersError::Database)?;
    let rows = query
        .order_by_desc(order::Column::CreatedAt)
        .offset(pagination.offset())
        .limit(pagination.limit())
        .all(&ctx.db)
        .await
        .map_err(OrdersError::Database)?;

    Ok(ok(
        "orders",
        PaginatedResponse {
            data: rows
                .into_iter()
                .map(OrderListItem::from_model)
                .collect::<Vec<_>>(),
            meta: PaginationMeta::new(pagination.page, pagination.limit(), total),
        },
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    tag = "admin",
    responses((status = 200, description = "Order detail", body = OrderResponse))
)]
async fn get_order(
    State(ctx): State<AppContext>,
    AdminUser(_admin): AdminUser,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let order = engine.orders.get(order_id).await?;
    let items = engine.orders.items_of(order_id).await?;
    let history = engine.orders.history_of(order_id).await?;
    Ok(ok("order", OrderResponse::from_models(order, items, history)?))
}

/// Admin-driven order transition; cancellation here carries the admin
/// override and requires a reason.
#[utoipa::path(
    put,
    path = "/api/admin/orders/{id}/status",
    tag = "admin",
    request_body = UpdateOrderStatusInput,
    responses(
        (status = 200, description = "Transition applied", body = OrderResponse),
        (status = 409, description = "Illegal edge or version conflict")
    )
)]
async fn update_order_status(
    State(ctx): State<AppContext>,
    AdminUser(admin): AdminUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateOrderStatusInput>,
) -> ApiResult<Response> {
    input.validate()?;
    let engine = engine_from_context(&ctx)?;

    let order = if input.status == OrderStatus::Cancelled {
        let reason = input
            .cancel_reason
            .unwrap_or(kirana_orders::entities::order::CancelReason::Other);
        engine
            .orders
            .cancel(
                order_id,
                reason,
                input.reason.clone(),
                Actor::admin(admin.id),
                true,
            )
            .await?
    } else {
        engine
            .orders
            .transition(
                order_id,
                input.status,
                Actor::admin(admin.id),
                true,
                TransitionExtras {
                    reason: input.reason.clone(),
                    tracking_number: input.tracking_number.clone(),
                    carrier: input.carrier.clone(),
                    cancel_reason: None,
                    expected_version: input.version,
                },
            )
            .await?
    };

    let items = engine.orders.items_of(order_id).await?;
    let history = engine.orders.history_of(order_id).await?;
    Ok(ok("status updated", OrderResponse::from_models(order, items, history)?))
}

#[utoipa::path(
    post,
    path = "/api/admin/refunds/{id}/approve",
    tag = "admin",
    request_body = ApproveRefundInput,
    responses((status = 200, description = "Refund approved", body = RefundResponse))
)]
async fn approve_refund(
    State(ctx): State<AppContext>,
    AdminUser(admin): AdminUser,
    Path(refund_id): Path<Uuid>,
    Json(input): Json<ApproveRefundInput>,
) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let refund = engine.refunds.approve(admin.id, refund_id, input).await?;
    Ok(ok("refund approved", RefundResponse::from(refund)))
}

#[utoipa::path(
    post,
    path = "/api/admin/refunds/{id}/reject",
    tag = "admin",
    responses((status = 200, description = "Refund rejected", body = RefundResponse))
)]
async fn reject_refund(
    State(ctx): State<AppContext>,
    AdminUser(admin): AdminUser,
    Path(refund_id): Path<Uuid>,
) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let refund = engine.refunds.reject(admin.id, refund_id).await?;
    Ok(ok("refund rejected", RefundResponse::from(refund)))
}

#[utoipa::path(
    post,
    path = "/api/admin/refunds/{id}/process",
    tag = "admin",
    responses(
        (status = 200, description = "Refund dispatched", body = RefundResponse),
        (status = 503, description = "Gateway unavailable; refund remains processing")
    )
)]
async fn process_refund(
    State(ctx): State<AppContext>,
    AdminUser(admin): AdminUser,
    Path(refund_id): Path<Uuid>,
) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let refund = engine.refunds.process(admin.id, refund_id).await?;
    Ok(ok("refund processed", RefundResponse::from(refund)))
}

#[utoipa::path(
    post,
    path = "/api/admin/returns/{id}/approve",
    tag = "admin",
    responses((status = 200, description = "Return approved", body = ReturnResponse))
)]
async fn approve_return(
    State(ctx): State<AppContext>,
    AdminUser(admin): AdminUser,
    Path(return_id): Path<Uuid>,
) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let request = engine.returns.approve(admin.id, return_id).await?;
    Ok(ok("return approved", ReturnResponse::from(request)))
}

#[utoipa::path(
    post,
    path = "/api/admin/returns/{id}/reject",
    tag = "admin",
    responses((status = 200, description = "Return rejected", body = ReturnResponse))
)]
async fn reject_return(
    State(ctx): State<AppContext>,
    AdminUser(admin): AdminUser,
    Path(return_id): Path<Uuid>,
) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let request = engine.returns.reject(admin.id, return_id).await?;
    Ok(ok("return rejected", ReturnResponse::from(request)))
}

#[utoipa::path(
    post,
    path = "/api/admin/returns/{id}/schedule-pickup",
    tag = "admin",
    request_body = SchedulePickupInput,
    responses((status = 200, description = "Pickup scheduled", body = ReturnResponse))
)]
async fn schedule_pickup(
    State(ctx): State<AppContext>,
    AdminUser(admin): AdminUser,
    Path(return_id): Path<Uuid>,
    Json(input): Json<SchedulePickupInput>,
) -> ApiResult<Response> {
    input.validate()?;
    let engine = engine_from_context(&ctx)?;
    let request = engine
        .returns
        .schedule_pickup(admin.id, return_id, input)
        .await?;
    Ok(ok("pickup scheduled", ReturnResponse::from(request)))
}

#[derive(Debug, Deserialize)]
struct PickedUpInput {
    tracking_number: Option<String>,
}

async fn mark_picked_up(
    State(ctx): State<AppContext>,
    AdminUser(admin): AdminUser,
    Path(return_id): Path<Uuid>,
    Json(input): Json<PickedUpInput>,
) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let request = engine
        .returns
        .mark_picked_up(admin.id, return_id, input.tracking_number)
        .await?;
    Ok(ok("return picked up", ReturnResponse::from(request)))
}

async fn mark_received(
    State(ctx): State<AppContext>,
    AdminUser(admin): AdminUser,
    Path(return_id): Path<Uuid>,
) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let request = engine.returns.mark_received(admin.id, return_id).await?;
    Ok(ok("return received", ReturnResponse::from(request)))
}

#[utoipa::path(
    post,
    path = "/api/admin/returns/{id}/inspect",
    tag = "admin",
    request_body = InspectReturnInput,
    responses((status = 200, description = "Inspection recorded", body = ReturnResponse))
)]
async fn inspect_return(
    State(ctx): State<AppContext>,
    AdminUser(admin): AdminUser,
    Path(return_id): Path<Uuid>,
    Json(input): Json<InspectReturnInput>,
) -> ApiResult<Response> {
    input.validate()?;
    let engine = engine_from_context(&ctx)?;
    let request = engine.returns.inspect(admin.id, return_id, input).await?;
    Ok(ok("inspection recorded", ReturnResponse::from(request)))
}

#[utoipa::path(
    post,
    path = "/api/admin/invoices/generate/{order_id}",
    tag = "admin",
    responses((status = 200, description = "Invoice generated", body = InvoiceResponse))
)]
async fn generate_invoice(
    State(ctx): State<AppContext>,
    AdminUser(admin): AdminUser,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let invoice = engine
        .invoices
        .generate(order_id, &admin.id.to_string())
        .await?;
    Ok(ok("invoice generated", InvoiceResponse::from(invoice)))
}

#[utoipa::path(
    get,
    path = "/api/admin/payments/stats",
    tag = "admin",
    responses((status = 200, description = "Payment aggregates", body = PaymentStatsResponse))
)]
async fn payment_stats(
    State(ctx): State<AppContext>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let stats = engine.payments.stats().await?;
    Ok(ok("payment stats", stats))
}

pub fn routes() -> Routes {
    Routes::new()
        .prefix("api/admin")
        .add("/orders", get(list_orders))
        .add("/orders/{id}", get(get_order))
        .add("/orders/{id}/status", put(update_order_status))
        .add("/refunds/{id}/approve", post(approve_refund))
        .add("/refunds/{id}/reject", post(reject_refund))
        .add("/refunds/{id}/process", post(process_refund))
        .add("/returns/{id}/approve", post(approve_return))
        .add("/returns/{id}/reject", post(reject_return))
        .add("/returns/{id}/schedule-pickup", post(schedule_pickup))
        .add("/returns/{id}/picked-up", post(mark_picked_up))
        .add("/returns/{id}/received", post(mark_received))
        .add("/returns/{id}/inspect", post(inspect_return))
        .add("/invoices/generate/{order_id}", post(generate_invoice))
        .add("/payments/stats", get(payment_stats))
}
