mod common;

use std::collections::HashSet;

use chrono::{Duration, Utc};
use common::setup;
use kirana_orders::dto::cart::CartOwner;
use kirana_orders::entities::cart_item;
use kirana_orders::types::PriceSnapshot;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

#[tokio::test]
async fn merge_without_guest_cart_is_a_noop() {
    let env = setup().await;
    let merged = env
        .carts
        .merge_guest_into_user("missing-session", Uuid::new_v4())
        .await
        .unwrap();
    assert!(merged.is_none());
}

#[tokio::test]
async fn merge_reparents_when_user_has_no_cart() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let guest = CartOwner::Guest("guest-1".to_string());
    let (product_id, variant_id) = env.seed_variant("Haldi", dec!(75.00));
    env.add_to_cart(&guest, product_id, variant_id, 2).await;

    let merged = env
        .carts
        .merge_guest_into_user("guest-1", user_id)
        .await
        .unwrap()
        .expect("cart migrated");

    assert_eq!(merged.user_id, Some(user_id));
    assert_eq!(merged.session_id, None);
    assert!(env.carts.find_active_cart(&guest).await.unwrap().is_none());
    let items = env.carts.items_of(merged.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 2);
}

#[tokio::test]
async fn merge_coalesces_matching_lines_and_newer_snapshot_wins() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let user = CartOwner::User(user_id);
    let guest = CartOwner::Guest("guest-2".to_string());
    let (product_id, variant_id) = env.seed_variant("Kumkumadi oil", dec!(280.00));

    // User added first at ₹280 (older snapshot).
    env.add_to_cart(&user, product_id, variant_id, 2).await;
    // Price rises; guest adds later at ₹300 (newer snapshot).
    env.pricing.set_price(variant_id, dec!(300.00), dec!(300.00));
    env.add_to_cart(&guest, product_id, variant_id, 1).await;

    // Make the ordering unambiguous regardless of clock resolution.
    nudge_snapshot_time(&env.db, &env.carts, &user, variant_id, -60).await;

    let merged = env
        .carts
        .merge_guest_into_user("guest-2", user_id)
        .await
        .unwrap()
        .expect("merged");

    let items = env.carts.items_of(merged.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 3);
    assert_eq!(items[0].unit_price, dec!(300.00));
    assert_eq!(items[0].line_total, dec!(900.00));
    assert!(env.carts.find_active_cart(&guest).await.unwrap().is_none());
}

#[tokio::test]
async fn merge_moves_unmatched_lines_unchanged() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let user = CartOwner::User(user_id);
    let guest = CartOwner::Guest("guest-3".to_string());
    let (product_a, variant_a) = env.seed_variant("Soap", dec!(45.00));
    let (product_b, variant_b) = env.seed_variant("Shampoo", dec!(180.00));

    env.add_to_cart(&user, product_a, variant_a, 1).await;
    env.add_to_cart(&guest, product_b, variant_b, 2).await;

    let merged = env
        .carts
        .merge_guest_into_user("guest-3", user_id)
        .await
        .unwrap()
        .expect("merged");

    let items = env.carts.items_of(merged.id).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(merged.item_count, 3);
    assert_eq!(merged.subtotal, dec!(405.00));

    // No variant key appears twice after the merge.
    let mut keys = HashSet::new();
    for item in &items {
        assert!(keys.insert((item.variant_id, item.bundle_id)));
    }
}

#[tokio::test]
async fn second_merge_is_a_noop() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let guest = CartOwner::Guest("guest-4".to_string());
    let (product_id, variant_id) = env.seed_variant("Face pack", dec!(99.00));
    env.add_to_cart(&guest, product_id, variant_id, 1).await;

    let first = env
        .carts
        .merge_guest_into_user("guest-4", user_id)
        .await
        .unwrap();
    assert!(first.is_some());

    let second = env
        .carts
        .merge_guest_into_user("guest-4", user_id)
        .await
        .unwrap();
    assert!(second.is_none());

    let items = env
        .carts
        .items_of(first.unwrap().id)
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 1);
}

/// Shift the captured_at of the user's line for `variant_id` by
/// `delta_secs` so snapshot-recency comparisons are deterministic.
async fn nudge_snapshot_time(
    db: &sea_orm::DatabaseConnection,
    carts: &kirana_orders::services::CartService,
    owner: &CartOwner,
    variant_id: Uuid,
    delta_secs: i64,
) {
    let cart = carts.find_active_cart(owner).await.unwrap().unwrap();
    let items = carts.items_of(cart.id).await.unwrap();
    let item = items
        .into_iter()
        .find(|item| item.variant_id == variant_id)
        .unwrap();
    let mut snapshot: PriceSnapshot = serde_json::from_value(item.price_snapshot.clone()).unwrap();
    snapshot.captured_at = Utc::now() + Duration::seconds(delta_secs);
    let mut active: cart_item::ActiveModel = item.into();
    active.price_snapshot = Set(serde_json::to_value(snapshot).unwrap());
    active.update(db).await.unwrap();
}
