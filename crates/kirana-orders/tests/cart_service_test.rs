mod common;

use common::setup;
use kirana_orders::dto::cart::{AddItemInput, CartOwner};
use kirana_orders::OrdersError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
async fn get_or_create_returns_the_same_active_cart() {
    let env = setup().await;
    let owner = CartOwner::Guest("sess-1".to_string());

    let first = env.carts.get_or_create_cart(&owner).await.unwrap();
    let second = env.carts.get_or_create_cart(&owner).await.unwrap();
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn add_item_captures_a_price_snapshot() {
    let env = setup().await;
    let owner = CartOwner::Guest("sess-2".to_string());
    let (product_id, variant_id) = env.seed_variant("Ashwagandha", dec!(249.00));

    env.add_to_cart(&owner, product_id, variant_id, 2).await;

    let cart = env.carts.find_active_cart(&owner).await.unwrap().unwrap();
    let items = env.carts.items_of(cart.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 2);
    assert_eq!(items[0].unit_price, dec!(249.00));
    assert_eq!(items[0].line_total, dec!(498.00));
    assert_eq!(cart.subtotal, dec!(498.00));
    assert_eq!(cart.item_count, 2);
    assert_eq!(cart.grand_total, dec!(498.00));
}

#[tokio::test]
async fn adding_the_same_variant_coalesces_into_one_line() {
    let env = setup().await;
    let owner = CartOwner::Guest("sess-3".to_string());
    let (product_id, variant_id) = env.seed_variant("Triphala", dec!(120.00));

    env.add_to_cart(&owner, product_id, variant_id, 2).await;
    env.add_to_cart(&owner, product_id, variant_id, 3).await;

    let cart = env.carts.find_active_cart(&owner).await.unwrap().unwrap();
    let items = env.carts.items_of(cart.id).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 5);
    assert_eq!(cart.item_count, 5);
    assert_eq!(cart.subtotal, dec!(600.00));
}

#[tokio::test]
async fn per_line_quantity_cap_is_enforced() {
    let env = setup().await;
    let owner = CartOwner::Guest("sess-4".to_string());
    let (product_id, variant_id) = env.seed_variant("Brahmi", dec!(99.00));

    env.add_to_cart(&owner, product_id, variant_id, 8).await;
    let result = env
        .carts
        .add_item(
            &owner,
            AddItemInput {
                product_id,
                variant_id,
                bundle_id: None,
                quantity: 5,
            },
        )
        .await;
    assert!(matches!(result, Err(OrdersError::Validation(_))));
}

#[tokio::test]
async fn totals_return_to_zero_when_all_items_are_removed() {
    let env = setup().await;
    let owner = CartOwner::Guest("sess-5".to_string());
    let (product_a, variant_a) = env.seed_variant("Neem", dec!(80.00));
    let (product_b, variant_b) = env.seed_variant("Tulsi", dec!(60.00));

    env.add_to_cart(&owner, product_a, variant_a, 1).await;
    env.add_to_cart(&owner, product_b, variant_b, 2).await;

    let cart = env.carts.find_active_cart(&owner).await.unwrap().unwrap();
    let items = env.carts.items_of(cart.id).await.unwrap();
    for item in items {
        env.carts.remove_item(&owner, item.id).await.unwrap();
    }

    let cart = env.carts.find_active_cart(&owner).await.unwrap().unwrap();
    assert_eq!(cart.subtotal, Decimal::ZERO);
    assert_eq!(cart.discount_total, Decimal::ZERO);
    assert_eq!(cart.grand_total, Decimal::ZERO);
    assert_eq!(cart.item_count, 0);
}

#[tokio::test]
async fn coupon_discount_is_cached_and_reused() {
    let env = setup().await;
    let owner = CartOwner::User(Uuid::new_v4());
    let (product_id, variant_id) = env.seed_variant("Chyawanprash", dec!(400.00));
    env.pricing.seed_coupon("WELCOME50", dec!(50.00));

    env.add_to_cart(&owner, product_id, variant_id, 1).await;
    let cart = env.carts.apply_coupon(&owner, "WELCOME50").await.unwrap();

    assert_eq!(cart.discount_total, dec!(50.00));
    assert_eq!(cart.grand_total, dec!(350.00));
}

#[tokio::test]
async fn reapplying_a_coupon_conflicts() {
    let env = setup().await;
    let owner = CartOwner::User(Uuid::new_v4());
    let (product_id, variant_id) = env.seed_variant("Shatavari", dec!(300.00));
    env.pricing.seed_coupon("FEST10", dec!(10.00));

    env.add_to_cart(&owner, product_id, variant_id, 1).await;
    env.carts.apply_coupon(&owner, "FEST10").await.unwrap();
    let result = env.carts.apply_coupon(&owner, "FEST10").await;
    assert!(matches!(result, Err(OrdersError::Conflict(_))));
}

#[tokio::test]
async fn invalid_coupon_is_rejected() {
    let env = setup().await;
    let owner = CartOwner::User(Uuid::new_v4());
    let (product_id, variant_id) = env.seed_variant("Amla", dec!(150.00));

    env.add_to_cart(&owner, product_id, variant_id, 1).await;
    let result = env.carts.apply_coupon(&owner, "NOPE").await;
    assert!(matches!(result, Err(OrdersError::Validation(_))));
}

#[tokio::test]
async fn grand_total_clamps_at_zero_under_oversized_discount() {
    let env = setup().await;
    let owner = CartOwner::User(Uuid::new_v4());
    let (product_id, variant_id) = env.seed_variant("Sample pack", dec!(30.00));
    env.pricing.seed_coupon("HUGE", dec!(100.00));

    env.add_to_cart(&owner, product_id, variant_id, 1).await;
    let cart = env.carts.apply_coupon(&owner, "HUGE").await.unwrap();
    assert_eq!(cart.grand_total, Decimal::ZERO);
}

#[tokio::test]
async fn cart_update_events_reach_the_outbox_transport() {
    let env = setup().await;
    let owner = CartOwner::Guest("sess-6".to_string());
    let (product_id, variant_id) = env.seed_variant("Ghee", dec!(550.00));

    env.add_to_cart(&owner, product_id, variant_id, 1).await;
    assert_eq!(env.transport.of_type("cart.updated").len(), 1);
}
