mod common;

use chrono::{Duration, Utc};
use common::{setup, GATEWAY_SECRET, WEBHOOK_SECRET};
use kirana_orders::clients::GatewayPaymentStatus;
use kirana_orders::dto::cart::CartOwner;
use kirana_orders::dto::payment::VerifySignatureInput;
use kirana_orders::entities::payment::PaymentStatus;
use kirana_orders::entities::{order, payment};
use kirana_orders::services::WebhookOutcome;
use kirana_orders::signature;
use kirana_orders::OrdersError;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

async fn initiated_payment(env: &common::TestEnv, user_id: Uuid) -> (Uuid, String) {
    let (product_id, variant_id) = env.seed_variant("Payable", dec!(750.00));
    let owner = CartOwner::User(user_id);
    env.add_to_cart(&owner, product_id, variant_id, 1).await;
    let completion = env.checkout_user(user_id).await;
    (completion.order_id, completion.gateway_order_id)
}

#[tokio::test]
async fn valid_signature_marks_the_payment_paid() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let (order_id, gateway_order_id) = initiated_payment(&env, user_id).await;

    let sig = signature::sign_payment(&gateway_order_id, "pay_77", GATEWAY_SECRET);
    let paid = env
        .payments
        .verify(
            user_id,
            VerifySignatureInput {
                gateway_order_id: gateway_order_id.clone(),
                gateway_payment_id: "pay_77".to_string(),
                signature: sig,
            },
        )
        .await
        .unwrap();

    assert_eq!(paid.status, PaymentStatus::Paid);
    assert!(paid.paid_at.is_some());
    assert_eq!(paid.gateway_payment_id.as_deref(), Some("pay_77"));

    let order_row = order::Entity::find_by_id(order_id)
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order_row.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn tampered_signature_is_rejected() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let (_order_id, gateway_order_id) = initiated_payment(&env, user_id).await;

    let sig = signature::sign_payment(&gateway_order_id, "pay_77", "wrong-secret");
    let result = env
        .payments
        .verify(
            user_id,
            VerifySignatureInput {
                gateway_order_id,
                gateway_payment_id: "pay_77".to_string(),
                signature: sig,
            },
        )
        .await;
    assert!(matches!(result, Err(OrdersError::InvalidSignature)));
}

#[tokio::test]
async fn verify_replay_is_idempotent_and_paid_at_is_monotonic() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let (_order_id, gateway_order_id) = initiated_payment(&env, user_id).await;

    let sig = signature::sign_payment(&gateway_order_id, "pay_42", GATEWAY_SECRET);
    let input = VerifySignatureInput {
        gateway_order_id,
        gateway_payment_id: "pay_42".to_string(),
        signature: sig,
    };
    let first = env.payments.verify(user_id, input.clone()).await.unwrap();
    let second = env.payments.verify(user_id, input).await.unwrap();

    assert_eq!(first.paid_at, second.paid_at);
    assert_eq!(second.status, PaymentStatus::Paid);
}

#[tokio::test]
async fn webhook_capture_then_replay_is_a_duplicate() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let (order_id, gateway_order_id) = initiated_payment(&env, user_id).await;

    let body = serde_json::json!({
        "event": "payment.captured",
        "gateway_payment_id": "pay_hook",
        "gateway_order_id": gateway_order_id,
    })
    .to_string();
    let sig = signature::sign_webhook(body.as_bytes(), WEBHOOK_SECRET);

    let first = env.payments.handle_webhook(body.as_bytes(), &sig).await.unwrap();
    assert_eq!(first, WebhookOutcome::Processed);

    let after_first = payment::Entity::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();

    let second = env.payments.handle_webhook(body.as_bytes(), &sig).await.unwrap();
    assert_eq!(second, WebhookOutcome::Duplicate);

    let after_second = payment::Entity::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after_first.status, after_second.status);
    assert_eq!(after_first.paid_at, after_second.paid_at);
}

#[tokio::test]
async fn webhook_with_bad_signature_is_rejected() {
    let env = setup().await;
    let body = br#"{"event":"payment.captured","gateway_payment_id":"p"}"#;
    let result = env.payments.handle_webhook(body, "deadbeef").await;
    assert!(matches!(result, Err(OrdersError::InvalidSignature)));
}

#[tokio::test]
async fn unknown_webhook_events_are_acknowledged_and_ignored() {
    let env = setup().await;
    let body = serde_json::json!({
        "event": "subscription.renewed",
        "gateway_payment_id": "pay_x",
    })
    .to_string();
    let sig = signature::sign_webhook(body.as_bytes(), WEBHOOK_SECRET);
    let outcome = env.payments.handle_webhook(body.as_bytes(), &sig).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored);
}

#[tokio::test]
async fn failed_webhook_moves_payment_to_failed() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let (order_id, gateway_order_id) = initiated_payment(&env, user_id).await;

    let body = serde_json::json!({
        "event": "payment.failed",
        "gateway_payment_id": "pay_fail",
        "gateway_order_id": gateway_order_id,
    })
    .to_string();
    let sig = signature::sign_webhook(body.as_bytes(), WEBHOOK_SECRET);
    env.payments.handle_webhook(body.as_bytes(), &sig).await.unwrap();

    let row = payment::Entity::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, PaymentStatus::Failed);
}

#[tokio::test]
async fn reconciliation_advances_in_flight_payments_only() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let (order_id, _gateway_order_id) = initiated_payment(&env, user_id).await;

    // Pretend the gateway already knows a payment id for this attempt.
    let row = payment::Entity::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: payment::ActiveModel = row.into();
    active.gateway_payment_id = Set(Some("pay_recon".to_string()));
    active.update(&env.db).await.unwrap();

    env.gateway
        .set_payment_status("pay_recon", GatewayPaymentStatus::Captured);

    let stats = env.payments.reconcile_pending(100).await.unwrap();
    assert_eq!(stats.scanned, 1);
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.errors, 0);

    let row = payment::Entity::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, PaymentStatus::Paid);
    assert!(row.paid_at.is_some());

    // A second pass has nothing left to advance.
    let stats = env.payments.reconcile_pending(100).await.unwrap();
    assert_eq!(stats.scanned, 0);
}

#[tokio::test]
async fn reconciliation_ignores_payments_outside_the_window() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let (order_id, _) = initiated_payment(&env, user_id).await;

    let row = payment::Entity::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .one(&env.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: payment::ActiveModel = row.into();
    active.gateway_payment_id = Set(Some("pay_old".to_string()));
    active.created_at = Set(Utc::now() - Duration::hours(72));
    active.update(&env.db).await.unwrap();

    let stats = env.payments.reconcile_pending(100).await.unwrap();
    assert_eq!(stats.scanned, 0);
}
