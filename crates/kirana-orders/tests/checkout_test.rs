mod common;

use chrono::{Duration, Utc};
use common::{checkout_input, contact, setup};
use kirana_orders::dto::cart::CartOwner;
use kirana_orders::entities::cart::CartStatus;
use kirana_orders::entities::checkout_session::CheckoutStatus;
use kirana_orders::entities::{cart, checkout_session, order, order_item, payment, status_history};
use kirana_orders::types::TotalsSnapshot;
use kirana_orders::OrdersError;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

#[tokio::test]
async fn initiate_freezes_totals_and_reserves_stock() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let owner = CartOwner::User(user_id);
    let (product_id, variant_id) = env.seed_variant("Ashwagandha", dec!(249.00));
    env.add_to_cart(&owner, product_id, variant_id, 2).await;

    let session = env
        .checkout
        .initiate(user_id, checkout_input())
        .await
        .unwrap();

    assert_eq!(session.status, CheckoutStatus::Initiated);
    let totals: TotalsSnapshot = serde_json::from_value(session.totals.clone()).unwrap();
    assert_eq!(totals.subtotal, dec!(498.00));
    assert_eq!(totals.shipping_total, dec!(50.00));
    assert_eq!(totals.discount_total, dec!(0.00));
    assert_eq!(totals.grand_total, dec!(548.00));
    assert_eq!(env.inventory.reserved_tokens().len(), 1);
    assert!(session.expires_at > Utc::now() + Duration::minutes(25));
}

#[tokio::test]
async fn initiate_fails_when_an_item_is_unavailable() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let owner = CartOwner::User(user_id);
    let (product_id, variant_id) = env.seed_variant("Discontinued", dec!(100.00));
    env.add_to_cart(&owner, product_id, variant_id, 1).await;
    env.catalog.archive_product(product_id);

    let result = env.checkout.initiate(user_id, checkout_input()).await;
    assert!(matches!(result, Err(OrdersError::CartInvalid(_))));
}

#[tokio::test]
async fn partial_reservation_failure_releases_granted_lines() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let owner = CartOwner::User(user_id);
    let (product_a, variant_a) = env.seed_variant("In stock", dec!(100.00));
    let (product_b, variant_b) = env.seed_variant("Sold out", dec!(200.00));
    env.add_to_cart(&owner, product_a, variant_a, 1).await;
    env.add_to_cart(&owner, product_b, variant_b, 1).await;
    env.inventory.mark_out_of_stock(variant_b);

    let result = env.checkout.initiate(user_id, checkout_input()).await;
    assert!(matches!(result, Err(OrdersError::StockUnavailable { .. })));
    // Whatever was granted before the failing line came back.
    assert_eq!(
        env.inventory.released_tokens().len(),
        env.inventory.reserved_tokens().len()
    );
}

#[tokio::test]
async fn complete_materializes_an_immutable_order() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let owner = CartOwner::User(user_id);
    let (product_id, variant_id) = env.seed_variant("Ashwagandha", dec!(249.00));
    env.add_to_cart(&owner, product_id, variant_id, 2).await;

    let completion = env.checkout_user(user_id).await;

    assert!(completion.order_number.starts_with("ORD-"));
    assert_eq!(completion.amount, dec!(548.00));
    assert_eq!(completion.currency, "INR");

    let order_row = order::Entity::find_by_id(completion.order_id)
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order_row.status, order::OrderStatus::Pending);
    assert_eq!(order_row.version, 1);

    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(completion.order_id))
        .all(&env.db)
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 2);
    assert_eq!(items[0].unit_price, dec!(249.00));
    assert_eq!(items[0].name, "Ashwagandha");

    // Cart converted, payment initiated, history seeded.
    let cart_row = cart::Entity::find()
        .filter(cart::Column::UserId.eq(user_id))
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cart_row.status, CartStatus::Converted);

    let payments = payment::Entity::find()
        .filter(payment::Column::OrderId.eq(completion.order_id))
        .all(&env.db)
        .await
        .unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, payment::PaymentStatus::Initiated);

    let history = status_history::Entity::find()
        .filter(status_history::Column::OrderId.eq(completion.order_id))
        .all(&env.db)
        .await
        .unwrap();
    assert_eq!(history.len(), 3);
}

#[tokio::test]
async fn retried_complete_reuses_the_gateway_order() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let owner = CartOwner::User(user_id);
    let (product_id, variant_id) = env.seed_variant("Tea", dec!(150.00));
    env.add_to_cart(&owner, product_id, variant_id, 1).await;

    let session = env
        .checkout
        .initiate(user_id, checkout_input())
        .await
        .unwrap();

    // First attempt dies at the gateway.
    env.gateway.set_down(true);
    let first = env.checkout.complete(user_id, session.id, contact()).await;
    assert!(matches!(first, Err(OrdersError::GatewayUnavailable)));

    env.gateway.set_down(false);
    let second = env
        .checkout
        .complete(user_id, session.id, contact())
        .await
        .unwrap();
    assert_eq!(env.gateway.created_order_count(), 1);
    assert!(!second.gateway_order_id.is_empty());
}

#[tokio::test]
async fn completing_twice_returns_the_same_order() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let owner = CartOwner::User(user_id);
    let (product_id, variant_id) = env.seed_variant("Oil", dec!(220.00));
    env.add_to_cart(&owner, product_id, variant_id, 1).await;

    let session = env
        .checkout
        .initiate(user_id, checkout_input())
        .await
        .unwrap();
    let first = env
        .checkout
        .complete(user_id, session.id, contact())
        .await
        .unwrap();
    let second = env
        .checkout
        .complete(user_id, session.id, contact())
        .await
        .unwrap();

    assert_eq!(first.order_id, second.order_id);
    assert_eq!(first.order_number, second.order_number);
    assert_eq!(order::Entity::find().all(&env.db).await.unwrap().len(), 1);
}

#[tokio::test]
async fn price_drift_beyond_epsilon_blocks_completion() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let owner = CartOwner::User(user_id);
    let (product_id, variant_id) = env.seed_variant("Volatile", dec!(1000.00));
    env.add_to_cart(&owner, product_id, variant_id, 1).await;

    let session = env
        .checkout
        .initiate(user_id, checkout_input())
        .await
        .unwrap();

    // Catalog price rises 5% before completion.
    env.pricing.set_price(variant_id, dec!(1050.00), dec!(1050.00));

    let result = env.checkout.complete(user_id, session.id, contact()).await;
    assert!(matches!(result, Err(OrdersError::TotalsDrifted { .. })));

    // No order, no gateway charge.
    let orders = order::Entity::find().all(&env.db).await.unwrap();
    assert!(orders.is_empty());
    assert_eq!(env.gateway.created_order_count(), 0);
}

#[tokio::test]
async fn sub_epsilon_drift_is_tolerated() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let owner = CartOwner::User(user_id);
    let (product_id, variant_id) = env.seed_variant("Stable", dec!(100.000));
    env.add_to_cart(&owner, product_id, variant_id, 1).await;

    let session = env
        .checkout
        .initiate(user_id, checkout_input())
        .await
        .unwrap();

    // 0.009 is inside the tolerance; the revalidator does not even flag it.
    env.pricing.set_price(variant_id, dec!(100.009), dec!(100.009));
    let completion = env
        .checkout
        .complete(user_id, session.id, contact())
        .await
        .unwrap();
    assert_eq!(completion.amount, dec!(150.00));
}

#[tokio::test]
async fn expiry_releases_reservation_and_keeps_cart_active() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let owner = CartOwner::User(user_id);
    let (product_id, variant_id) = env.seed_variant("Expirable", dec!(90.00));
    env.add_to_cart(&owner, product_id, variant_id, 1).await;

    let session = env
        .checkout
        .initiate(user_id, checkout_input())
        .await
        .unwrap();

    // Force the deadline into the past.
    let mut active: checkout_session::ActiveModel = session.clone().into();
    active.expires_at = Set(Utc::now() - Duration::minutes(1));
    active.update(&env.db).await.unwrap();

    let expired = env.checkout.expire_stale(100).await.unwrap();
    assert_eq!(expired, 1);

    let session_row = checkout_session::Entity::find_by_id(session.id)
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session_row.status, CheckoutStatus::Expired);
    assert_eq!(env.inventory.released_tokens().len(), 1);

    let cart_row = env.carts.find_active_cart(&owner).await.unwrap();
    assert!(cart_row.is_some(), "cart stays active after expiry");

    // A terminal session cannot be completed.
    let result = env.checkout.complete(user_id, session.id, contact()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn stale_coupons_are_dropped_at_checkout_entry() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let owner = CartOwner::User(user_id);
    let (product_id, variant_id) = env.seed_variant("Couponed", dec!(500.00));
    env.pricing.seed_coupon("SAVE100", dec!(100.00));
    env.add_to_cart(&owner, product_id, variant_id, 1).await;
    env.carts.apply_coupon(&owner, "SAVE100").await.unwrap();

    env.pricing.invalidate_coupon("SAVE100");

    let session = env
        .checkout
        .initiate(user_id, checkout_input())
        .await
        .unwrap();
    let totals: TotalsSnapshot = serde_json::from_value(session.totals).unwrap();
    assert_eq!(totals.discount_total, dec!(0.00));
    assert_eq!(totals.grand_total, dec!(550.00));
}
