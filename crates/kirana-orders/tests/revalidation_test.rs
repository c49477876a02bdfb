mod common;

use common::setup;
use kirana_orders::dto::cart::CartOwner;
use kirana_orders::entities::cart_item;
use kirana_orders::types::WarningSeverity;
use kirana_orders::OrdersError;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

#[tokio::test]
async fn price_rise_rewrites_the_line_and_warns() {
    let env = setup().await;
    let owner = CartOwner::Guest("reval-1".to_string());
    let (product_id, variant_id) = env.seed_variant("Rising", dec!(100.00));
    env.add_to_cart(&owner, product_id, variant_id, 2).await;

    env.pricing.set_price(variant_id, dec!(110.00), dec!(120.00));
    let cart = env.carts.find_active_cart(&owner).await.unwrap().unwrap();
    let report = env.revalidator.revalidate_cart(cart.id).await.unwrap();

    assert_eq!(report.price_changes.len(), 1);
    assert_eq!(report.price_changes[0].old_price, dec!(100.00));
    assert_eq!(report.price_changes[0].new_price, dec!(110.00));

    let warning = report
        .warnings
        .iter()
        .find(|warning| warning.code == "PRICE_INCREASE")
        .expect("price increase warning");
    assert_eq!(warning.severity, WarningSeverity::Medium);
    assert_eq!(warning.amount_delta, Some(dec!(20.00)));

    let item = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.unit_price, dec!(110.00));
    assert_eq!(item.unit_mrp, dec!(120.00));
    assert_eq!(item.line_total, dec!(220.00));
    assert!(item.price_changed);
    assert_eq!(item.old_price, Some(dec!(100.00)));
    assert_eq!(item.new_price, Some(dec!(110.00)));
    assert!(item.last_checked_at.is_some());
}

#[tokio::test]
async fn price_drop_is_a_low_severity_warning() {
    let env = setup().await;
    let owner = CartOwner::Guest("reval-2".to_string());
    let (product_id, variant_id) = env.seed_variant("Falling", dec!(200.00));
    env.add_to_cart(&owner, product_id, variant_id, 1).await;

    env.pricing.set_price(variant_id, dec!(180.00), dec!(200.00));
    let cart = env.carts.find_active_cart(&owner).await.unwrap().unwrap();
    let report = env.revalidator.revalidate_cart(cart.id).await.unwrap();

    let warning = report
        .warnings
        .iter()
        .find(|warning| warning.code == "PRICE_DECREASE")
        .expect("price decrease warning");
    assert_eq!(warning.severity, WarningSeverity::Low);
}

#[tokio::test]
async fn changes_within_epsilon_are_not_flagged() {
    let env = setup().await;
    let owner = CartOwner::Guest("reval-3".to_string());
    let (product_id, variant_id) = env.seed_variant("Steady", dec!(100.000));
    env.add_to_cart(&owner, product_id, variant_id, 1).await;
    let cart = env.carts.find_active_cart(&owner).await.unwrap().unwrap();

    // 0.009 rounds to one paisa of drift: inside tolerance.
    env.pricing.set_price(variant_id, dec!(100.009), dec!(100.009));
    let report = env.revalidator.revalidate_cart(cart.id).await.unwrap();
    assert!(report.price_changes.is_empty());

    // 0.011 rounds past the tolerance: flagged.
    env.pricing.set_price(variant_id, dec!(100.02), dec!(100.02));
    let report = env.revalidator.revalidate_cart(cart.id).await.unwrap();
    assert_eq!(report.price_changes.len(), 1);
}

#[tokio::test]
async fn vanished_catalog_rows_mark_lines_unavailable() {
    let env = setup().await;
    let owner = CartOwner::Guest("reval-4".to_string());
    let (product_a, variant_a) = env.seed_variant("Archived soon", dec!(50.00));
    let (product_b, variant_b) = env.seed_variant("Inactive soon", dec!(60.00));
    env.add_to_cart(&owner, product_a, variant_a, 1).await;
    env.add_to_cart(&owner, product_b, variant_b, 1).await;

    env.catalog.archive_product(product_a);
    env.catalog.deactivate_variant(variant_b);

    let cart = env.carts.find_active_cart(&owner).await.unwrap().unwrap();
    let report = env.revalidator.revalidate_cart(cart.id).await.unwrap();

    assert_eq!(report.unavailable.len(), 2);
    let warning = report
        .warnings
        .iter()
        .find(|warning| warning.code == "ITEMS_UNAVAILABLE")
        .expect("unavailability warning");
    assert_eq!(warning.severity, WarningSeverity::High);

    let items = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .all(&env.db)
        .await
        .unwrap();
    let archived = items.iter().find(|item| item.variant_id == variant_a).unwrap();
    assert!(!archived.product_exists);
    let inactive = items.iter().find(|item| item.variant_id == variant_b).unwrap();
    assert!(!inactive.variant_exists);
}

#[tokio::test]
async fn revalidation_is_idempotent() {
    let env = setup().await;
    let owner = CartOwner::Guest("reval-5".to_string());
    let (product_id, variant_id) = env.seed_variant("Once", dec!(80.00));
    env.add_to_cart(&owner, product_id, variant_id, 1).await;
    let cart = env.carts.find_active_cart(&owner).await.unwrap().unwrap();

    env.pricing.set_price(variant_id, dec!(90.00), dec!(90.00));
    let first = env.revalidator.revalidate_cart(cart.id).await.unwrap();
    assert_eq!(first.price_changes.len(), 1);

    let second = env.revalidator.revalidate_cart(cart.id).await.unwrap();
    assert!(second.price_changes.is_empty());
    assert!(second.warnings.is_empty());
}

#[tokio::test]
async fn pricing_outage_aborts_without_mutation() {
    let env = setup().await;
    let owner = CartOwner::Guest("reval-6".to_string());
    let (product_id, variant_id) = env.seed_variant("Unreachable", dec!(40.00));
    env.add_to_cart(&owner, product_id, variant_id, 1).await;
    let cart = env.carts.find_active_cart(&owner).await.unwrap().unwrap();

    env.pricing.set_down(true);
    let result = env.revalidator.revalidate_cart(cart.id).await;
    assert!(matches!(result, Err(OrdersError::PricingUnavailable)));

    let item = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.unit_price, dec!(40.00));
    assert!(!item.price_changed);
}

#[tokio::test]
async fn empty_cart_revalidates_to_an_empty_report() {
    let env = setup().await;
    let owner = CartOwner::User(Uuid::new_v4());
    let cart = env.carts.get_or_create_cart(&owner).await.unwrap();
    let report = env.revalidator.revalidate_cart(cart.id).await.unwrap();
    assert!(report.is_clean());
    assert!(report.warnings.is_empty());
}
