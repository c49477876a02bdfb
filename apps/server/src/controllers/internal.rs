//! Internal service-to-service endpoints, authenticated with the shared
//! `X-Internal-Service-Key` header.

use axum::extract::State;
use axum::response::Response;
use axum::routing::post;
use axum::Json;
use loco_rs::app::AppContext;
use loco_rs::controller::Routes;
use validator::Validate;

use kirana_orders::dto::cart::{CartResponse, MigrateCartInput};

use crate::common::response::{ok, ApiResult};
use crate::extractors::auth::InternalService;
use crate::services::engine_from_context;

/// Guest→user cart migration, called by the auth service on login.
/// Invoking it twice is a no-op the second time.
#[utoipa::path(
    post,
    path = "/api/internal/cart/migrate",
    tag = "internal",
    request_body = MigrateCartInput,
    responses((status = 200, description = "Merge result", body = CartResponse))
)]
async fn migrate_cart(
    State(ctx): State<AppContext>,
    _auth: InternalService,
    Json(input): Json<MigrateCartInput>,
) -> ApiResult<Response> {
    input.validate()?;
    let engine = engine_from_context(&ctx)?;
    let merged = engine
        .carts
        .merge_guest_into_user(&input.guest_session_id, input.user_id)
        .await?;

    match merged {
        Some(cart) => {
            let items = engine.carts.items_of(cart.id).await?;
            Ok(ok("cart migrated", CartResponse::from_models(cart, items, Vec::new())))
        }
        None => Ok(ok("no guest cart to migrate", serde_json::json!(null))),
    }
}

pub fn routes() -> Routes {
    Routes::new()
        .prefix("api/internal")
        .add("/cart/migrate", post(migrate_cart))
}
