mod common;

use chrono::{Duration, Utc};
use common::setup;
use kirana_orders::dto::cart::CartOwner;
use kirana_orders::entities::order::{CancelReason, FulfillmentStatus, OrderStatus};
use kirana_orders::entities::refund::RefundStatus;
use kirana_orders::entities::{order, order_item, refund, status_history};
use kirana_orders::services::orders::TransitionExtras;
use kirana_orders::services::Actor;
use kirana_orders::OrdersError;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

async fn paid_pending_order(env: &common::TestEnv, user_id: Uuid) -> Uuid {
    let (product_id, variant_id) = env.seed_variant("Order fodder", dec!(500.00));
    let owner = CartOwner::User(user_id);
    env.add_to_cart(&owner, product_id, variant_id, 2).await;
    let completion = env.checkout_user(user_id).await;
    env.capture_via_webhook(&completion.gateway_order_id).await;
    completion.order_id
}

#[tokio::test]
async fn illegal_edges_are_rejected() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let order_id = paid_pending_order(&env, user_id).await;

    // pending → shipped skips confirmed/processing.
    let result = env
        .orders
        .transition(
            order_id,
            OrderStatus::Shipped,
            Actor::admin(Uuid::new_v4()),
            true,
            TransitionExtras::default(),
        )
        .await;
    assert!(matches!(result, Err(OrdersError::InvalidState(_))));
}

#[tokio::test]
async fn every_transition_appends_history() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let order_id = paid_pending_order(&env, user_id).await;

    let before = status_history::Entity::find()
        .filter(status_history::Column::OrderId.eq(order_id))
        .all(&env.db)
        .await
        .unwrap()
        .len();

    env.deliver_order(order_id).await;

    let after = status_history::Entity::find()
        .filter(status_history::Column::OrderId.eq(order_id))
        .all(&env.db)
        .await
        .unwrap();
    // Five order transitions plus one fulfillment row at ship time.
    assert_eq!(after.len(), before + 6);
}

#[tokio::test]
async fn shipping_fulfills_all_lines() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let order_id = paid_pending_order(&env, user_id).await;
    let admin = Actor::admin(Uuid::new_v4());

    env.orders
        .transition(order_id, OrderStatus::Confirmed, admin, false, TransitionExtras::default())
        .await
        .unwrap();
    env.orders
        .transition(order_id, OrderStatus::Processing, admin, false, TransitionExtras::default())
        .await
        .unwrap();
    let shipped = env
        .orders
        .transition(
            order_id,
            OrderStatus::Shipped,
            admin,
            false,
            TransitionExtras {
                tracking_number: Some("TRK1".to_string()),
                carrier: Some("Delhivery".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(shipped.fulfillment_status, FulfillmentStatus::Fulfilled);
    assert_eq!(shipped.tracking_number.as_deref(), Some("TRK1"));

    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(&env.db)
        .await
        .unwrap();
    assert!(items.iter().all(|item| item.quantity_fulfilled == item.quantity));
}

#[tokio::test]
async fn cancel_requires_a_reason_and_records_it() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let order_id = paid_pending_order(&env, user_id).await;

    let result = env
        .orders
        .transition(
            order_id,
            OrderStatus::Cancelled,
            Actor::customer(user_id),
            false,
            TransitionExtras::default(),
        )
        .await;
    assert!(matches!(result, Err(OrdersError::Validation(_))));

    let cancelled = env
        .orders
        .cancel(
            order_id,
            CancelReason::CustomerRequest,
            Some("changed my mind".to_string()),
            Actor::customer(user_id),
            false,
        )
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.cancel_reason, Some(CancelReason::CustomerRequest));
}

#[tokio::test]
async fn cancel_from_paid_state_enqueues_a_full_refund() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let order_id = paid_pending_order(&env, user_id).await;

    env.orders
        .cancel(
            order_id,
            CancelReason::CustomerRequest,
            None,
            Actor::customer(user_id),
            false,
        )
        .await
        .unwrap();

    let refunds = refund::Entity::find()
        .filter(refund::Column::OrderId.eq(order_id))
        .all(&env.db)
        .await
        .unwrap();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].status, RefundStatus::Requested);
    assert_eq!(refunds[0].refund_amount, dec!(1000.00));
}

#[tokio::test]
async fn admin_override_cancels_a_processing_order() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let order_id = paid_pending_order(&env, user_id).await;
    let admin = Actor::admin(Uuid::new_v4());

    env.orders
        .transition(order_id, OrderStatus::Confirmed, admin, false, TransitionExtras::default())
        .await
        .unwrap();
    env.orders
        .transition(order_id, OrderStatus::Processing, admin, false, TransitionExtras::default())
        .await
        .unwrap();

    // Customer cannot cancel from processing...
    let customer_attempt = env
        .orders
        .cancel(
            order_id,
            CancelReason::CustomerRequest,
            None,
            Actor::customer(user_id),
            false,
        )
        .await;
    assert!(customer_attempt.is_err());

    // ...but an admin override can.
    let cancelled = env
        .orders
        .cancel(
            order_id,
            CancelReason::OutOfStock,
            Some("stock audit".to_string()),
            admin,
            true,
        )
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn stale_expected_version_conflicts() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let order_id = paid_pending_order(&env, user_id).await;
    let admin = Actor::admin(Uuid::new_v4());

    let current = env.orders.get(order_id).await.unwrap();

    // Admin A ships... (confirm + process first to make the edge legal)
    env.orders
        .transition(order_id, OrderStatus::Confirmed, admin, false, TransitionExtras::default())
        .await
        .unwrap();

    // Admin B still holds the old version.
    let result = env
        .orders
        .transition(
            order_id,
            OrderStatus::Processing,
            admin,
            false,
            TransitionExtras {
                expected_version: Some(current.version),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(OrdersError::Conflict(_))));
}

#[tokio::test]
async fn cancel_after_ship_without_override_is_rejected() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let order_id = paid_pending_order(&env, user_id).await;
    env.deliver_order(order_id).await;

    // Delivered orders cannot be cancelled even with override.
    let result = env
        .orders
        .cancel(
            order_id,
            CancelReason::Other,
            None,
            Actor::admin(Uuid::new_v4()),
            true,
        )
        .await;
    assert!(matches!(result, Err(OrdersError::InvalidState(_))));
}

#[tokio::test]
async fn auto_confirm_picks_up_stale_paid_orders() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let order_id = paid_pending_order(&env, user_id).await;

    // Fresh order: not eligible yet.
    assert_eq!(env.orders.auto_confirm(100).await.unwrap(), 0);

    // Age it past the window.
    let row = order::Entity::find_by_id(order_id)
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: order::ActiveModel = row.into();
    active.created_at = Set(Utc::now() - Duration::hours(7));
    active.update(&env.db).await.unwrap();

    assert_eq!(env.orders.auto_confirm(100).await.unwrap(), 1);
    let confirmed = env.orders.get(order_id).await.unwrap();
    assert_eq!(confirmed.status, OrderStatus::Confirmed);
}
