//! Consumer invoice endpoints.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::get;
use loco_rs::app::AppContext;
use loco_rs::controller::Routes;
use uuid::Uuid;

use kirana_orders::dto::invoice::InvoiceResponse;
use kirana_orders::OrdersError;

use crate::common::response::{ok, ApiResult};
use crate::extractors::auth::CurrentUser;
use crate::services::engine_from_context;

#[utoipa::path(
    get,
    path = "/api/invoices",
    tag = "invoices",
    responses((status = 200, description = "Invoices for the caller's orders", body = [InvoiceResponse]))
)]
async fn list_invoices(State(ctx): State<AppContext>, user: CurrentUser) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let invoices = engine.invoices.list_for_user(user.id).await?;
    let data: Vec<InvoiceResponse> = invoices.into_iter().map(InvoiceResponse::from).collect();
    Ok(ok("invoices", data))
}

#[utoipa::path(
    get,
    path = "/api/invoices/{id}",
    tag = "invoices",
    responses(
        (status = 200, description = "Invoice detail", body = InvoiceResponse),
        (status = 404, description = "Not found")
    )
)]
async fn get_invoice(
    State(ctx): State<AppContext>,
    user: CurrentUser,
    Path(invoice_id): Path<Uuid>,
) -> ApiResult<Response> {
    let engine = engine_from_context(&ctx)?;
    let invoice = engine.invoices.get(invoice_id).await?;
    // Ownership via the linked order.
    engine
        .orders
        .get_owned(invoice.order_id, user.id)
        .await
        .map_err(|_| OrdersError::not_found("Invoice", invoice_id))?;
    Ok(ok("invoice", InvoiceResponse::from(invoice)))
}

pub fn routes() -> Routes {
    Routes::new()
        .prefix("api/invoices")
        .add("/", get(list_invoices))
        .add("/{id}", get(get_invoice))
}
