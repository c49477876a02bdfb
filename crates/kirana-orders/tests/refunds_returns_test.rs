mod common;

use chrono::{Duration, Utc};
use common::setup;
use kirana_orders::dto::refund::{ApproveRefundInput, RefundItemInput, RequestRefundInput};
use kirana_orders::dto::return_request::{
    InspectReturnInput, RequestReturnInput, ReturnItemInput, SchedulePickupInput,
};
use kirana_orders::entities::payment::PaymentStatus;
use kirana_orders::entities::refund::{RefundMethod, RefundStatus};
use kirana_orders::entities::return_request::{InspectionVerdict, ReturnStatus};
use kirana_orders::entities::{order_item, payment};
use kirana_orders::OrdersError;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

async fn order_items_of(env: &common::TestEnv, order_id: Uuid) -> Vec<order_item::Model> {
    order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(&env.db)
        .await
        .unwrap()
}

async fn payment_of(env: &common::TestEnv, order_id: Uuid) -> payment::Model {
    payment::Entity::find()
        .filter(payment::Column::OrderId.eq(order_id))
        .one(&env.db)
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn partial_refund_updates_items_and_payment() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    // Delivered order: 2 units at ₹500.
    let completion = env.delivered_order(user_id, dec!(500.00), 2).await;
    let items = order_items_of(&env, completion.order_id).await;

    let refund = env
        .refunds
        .request(
            user_id,
            RequestRefundInput {
                order_id: completion.order_id,
                items: vec![RefundItemInput {
                    order_item_id: items[0].id,
                    quantity: 1,
                }],
                description: Some("damaged cap".to_string()),
                method: RefundMethod::OriginalPaymentMethod,
            },
        )
        .await
        .unwrap();

    assert!(refund.refund_number.starts_with("REF-"));
    assert_eq!(refund.refund_amount, dec!(500.00));
    assert_eq!(refund.status, RefundStatus::Requested);

    let admin = Uuid::new_v4();
    let approved = env
        .refunds
        .approve(admin, refund.id, ApproveRefundInput { approved_amount: None })
        .await
        .unwrap();
    assert_eq!(approved.approved_amount, Some(dec!(500.00)));

    let completed = env.refunds.process(admin, refund.id).await.unwrap();
    assert_eq!(completed.status, RefundStatus::Completed);
    assert!(completed.gateway_refund_id.is_some());

    let items = order_items_of(&env, completion.order_id).await;
    assert_eq!(items[0].quantity_refunded, 1);

    let pay = payment_of(&env, completion.order_id).await;
    assert_eq!(pay.refunded_amount, dec!(500.00));
    assert_eq!(pay.status, PaymentStatus::PartiallyRefunded);

    // Order status is untouched by a partial refund.
    let order_row = env.orders.get(completion.order_id).await.unwrap();
    assert_eq!(
        order_row.status,
        kirana_orders::entities::order::OrderStatus::Delivered
    );
}

#[tokio::test]
async fn refunding_the_full_remainder_closes_the_payment() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let completion = env.delivered_order(user_id, dec!(250.00), 2).await;
    let items = order_items_of(&env, completion.order_id).await;
    let admin = Uuid::new_v4();

    let refund = env
        .refunds
        .request(
            user_id,
            RequestRefundInput {
                order_id: completion.order_id,
                items: vec![RefundItemInput {
                    order_item_id: items[0].id,
                    quantity: 2,
                }],
                description: None,
                method: RefundMethod::OriginalPaymentMethod,
            },
        )
        .await
        .unwrap();
    env.refunds
        .approve(admin, refund.id, ApproveRefundInput { approved_amount: None })
        .await
        .unwrap();
    env.refunds.process(admin, refund.id).await.unwrap();

    let items = order_items_of(&env, completion.order_id).await;
    assert_eq!(items[0].quantity_refunded, items[0].quantity);

    let pay = payment_of(&env, completion.order_id).await;
    // Shipping stays with the merchant; the item value came back in full.
    assert_eq!(pay.refunded_amount, dec!(500.00));
    assert_eq!(pay.status, PaymentStatus::PartiallyRefunded);
}

#[tokio::test]
async fn refunding_everything_reaches_refunded_status() {
    let env = setup().await;
    env.shipping.set_rate(dec!(0.00));
    let user_id = Uuid::new_v4();
    let completion = env.delivered_order(user_id, dec!(250.00), 2).await;
    let items = order_items_of(&env, completion.order_id).await;
    let admin = Uuid::new_v4();

    let refund = env
        .refunds
        .request(
            user_id,
            RequestRefundInput {
                order_id: completion.order_id,
                items: vec![RefundItemInput {
                    order_item_id: items[0].id,
                    quantity: 2,
                }],
                description: None,
                method: RefundMethod::OriginalPaymentMethod,
            },
        )
        .await
        .unwrap();
    env.refunds
        .approve(admin, refund.id, ApproveRefundInput { approved_amount: None })
        .await
        .unwrap();
    env.refunds.process(admin, refund.id).await.unwrap();

    let items = order_items_of(&env, completion.order_id).await;
    assert_eq!(items[0].quantity_refunded, items[0].quantity);
    let pay = payment_of(&env, completion.order_id).await;
    assert_eq!(pay.refunded_amount, pay.amount);
    assert_eq!(pay.status, PaymentStatus::Refunded);
}

#[tokio::test]
async fn over_refunding_a_line_is_rejected() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let completion = env.delivered_order(user_id, dec!(100.00), 1).await;
    let items = order_items_of(&env, completion.order_id).await;

    let result = env
        .refunds
        .request(
            user_id,
            RequestRefundInput {
                order_id: completion.order_id,
                items: vec![RefundItemInput {
                    order_item_id: items[0].id,
                    quantity: 2,
                }],
                description: None,
                method: RefundMethod::OriginalPaymentMethod,
            },
        )
        .await;
    assert!(matches!(result, Err(OrdersError::Validation(_))));
}

#[tokio::test]
async fn gateway_outage_leaves_refund_processing() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let completion = env.delivered_order(user_id, dec!(300.00), 1).await;
    let items = order_items_of(&env, completion.order_id).await;
    let admin = Uuid::new_v4();

    let refund = env
        .refunds
        .request(
            user_id,
            RequestRefundInput {
                order_id: completion.order_id,
                items: vec![RefundItemInput {
                    order_item_id: items[0].id,
                    quantity: 1,
                }],
                description: None,
                method: RefundMethod::OriginalPaymentMethod,
            },
        )
        .await
        .unwrap();
    env.refunds
        .approve(admin, refund.id, ApproveRefundInput { approved_amount: None })
        .await
        .unwrap();

    env.gateway.set_down(true);
    let result = env.refunds.process(admin, refund.id).await;
    assert!(matches!(result, Err(OrdersError::GatewayUnavailable)));

    let row = env.refunds.get(refund.id).await.unwrap();
    assert_eq!(row.status, RefundStatus::Processing);

    // The webhook later closes it out.
    env.gateway.set_down(false);
    // Simulate dispatch succeeding out-of-band with a known gateway id.
    use sea_orm::{ActiveModelTrait, Set};
    let mut active: kirana_orders::entities::refund::ActiveModel = row.into();
    active.gateway_refund_id = Set(Some("rfnd_oob".to_string()));
    active.update(&env.db).await.unwrap();

    let completed = env.refunds.complete_by_gateway_id("rfnd_oob").await.unwrap();
    assert!(completed);
    let row = env.refunds.get(refund.id).await.unwrap();
    assert_eq!(row.status, RefundStatus::Completed);

    // Replay of the webhook is a no-op.
    let replay = env.refunds.complete_by_gateway_id("rfnd_oob").await.unwrap();
    assert!(!replay);
}

#[tokio::test]
async fn store_credit_refund_emits_a_ledger_event() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let completion = env.delivered_order(user_id, dec!(150.00), 1).await;
    let items = order_items_of(&env, completion.order_id).await;
    let admin = Uuid::new_v4();

    let refund = env
        .refunds
        .request(
            user_id,
            RequestRefundInput {
                order_id: completion.order_id,
                items: vec![RefundItemInput {
                    order_item_id: items[0].id,
                    quantity: 1,
                }],
                description: None,
                method: RefundMethod::StoreCredit,
            },
        )
        .await
        .unwrap();
    env.refunds
        .approve(admin, refund.id, ApproveRefundInput { approved_amount: None })
        .await
        .unwrap();
    env.refunds.process(admin, refund.id).await.unwrap();

    assert_eq!(env.transport.of_type("store_credit.issued").len(), 1);
    assert_eq!(env.gateway.refund_count(), 0);
}

// ---------------------------------------------------------------------------
// Returns
// ---------------------------------------------------------------------------

fn return_input(order_id: Uuid, order_item_id: Uuid, quantity: i32) -> RequestReturnInput {
    RequestReturnInput {
        order_id,
        items: vec![ReturnItemInput {
            order_item_id,
            quantity,
            reason: "wrong shade".to_string(),
            condition: Some("unopened".to_string()),
            images: vec![],
        }],
        pickup_address: None,
    }
}

#[tokio::test]
async fn return_window_boundary_is_inclusive_then_closed() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let completion = env.delivered_order(user_id, dec!(200.00), 1).await;
    let items = order_items_of(&env, completion.order_id).await;

    // Delivered 7 days ago, still inside the day boundary: allowed.
    env.backdate_delivery(
        completion.order_id,
        Utc::now() - Duration::days(7) + Duration::minutes(1),
    )
    .await;
    let request = env
        .returns
        .request(user_id, return_input(completion.order_id, items[0].id, 1))
        .await
        .unwrap();
    assert!(request.return_number.starts_with("RET-"));
    env.returns.cancel(user_id, request.id).await.unwrap();

    // Delivered 8 days ago: the window closed at end of day 7.
    env.backdate_delivery(completion.order_id, Utc::now() - Duration::days(8)).await;
    let result = env
        .returns
        .request(user_id, return_input(completion.order_id, items[0].id, 1))
        .await;
    assert!(matches!(result, Err(OrdersError::ReturnWindowClosed)));
}

#[tokio::test]
async fn accepted_inspection_creates_an_approved_refund() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let admin = Uuid::new_v4();
    let completion = env.delivered_order(user_id, dec!(400.00), 2).await;
    let items = order_items_of(&env, completion.order_id).await;

    let request = env
        .returns
        .request(user_id, return_input(completion.order_id, items[0].id, 1))
        .await
        .unwrap();

    env.returns.approve(admin, request.id).await.unwrap();
    env.returns
        .schedule_pickup(
            admin,
            request.id,
            SchedulePickupInput {
                date: Utc::now().date_naive() + Duration::days(1),
                window: "10:00-13:00".to_string(),
            },
        )
        .await
        .unwrap();
    env.returns
        .mark_picked_up(admin, request.id, Some("RTRK1".to_string()))
        .await
        .unwrap();
    env.returns.mark_in_transit(request.id).await.unwrap();
    env.returns.mark_received(admin, request.id).await.unwrap();

    let inspected = env
        .returns
        .inspect(
            admin,
            request.id,
            InspectReturnInput {
                verdict: InspectionVerdict::Accepted,
                notes: Some("resellable".to_string()),
                partial_amount: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(inspected.status, ReturnStatus::RefundInitiated);
    let refund_id = inspected.refund_id.expect("linked refund");
    let refund = env.refunds.get(refund_id).await.unwrap();
    assert_eq!(refund.status, RefundStatus::Approved);
    assert_eq!(refund.approved_amount, Some(dec!(400.00)));

    let items = order_items_of(&env, completion.order_id).await;
    assert_eq!(items[0].quantity_returned, 1);
    assert!(items[0].quantity_returned <= items[0].quantity_fulfilled);

    // Dispatch the refund and close the loop.
    env.refunds.process(admin, refund_id).await.unwrap();
    let closed = env.returns.complete(request.id).await.unwrap();
    assert_eq!(closed.status, ReturnStatus::Completed);
}

#[tokio::test]
async fn rejected_inspection_cancels_without_refund() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let admin = Uuid::new_v4();
    let completion = env.delivered_order(user_id, dec!(120.00), 1).await;
    let items = order_items_of(&env, completion.order_id).await;

    let request = env
        .returns
        .request(user_id, return_input(completion.order_id, items[0].id, 1))
        .await
        .unwrap();
    env.returns.approve(admin, request.id).await.unwrap();
    env.returns
        .schedule_pickup(
            admin,
            request.id,
            SchedulePickupInput {
                date: Utc::now().date_naive() + Duration::days(1),
                window: "14:00-18:00".to_string(),
            },
        )
        .await
        .unwrap();
    env.returns.mark_picked_up(admin, request.id, None).await.unwrap();
    env.returns.mark_in_transit(request.id).await.unwrap();
    env.returns.mark_received(admin, request.id).await.unwrap();

    let rejected = env
        .returns
        .inspect(
            admin,
            request.id,
            InspectReturnInput {
                verdict: InspectionVerdict::Rejected,
                notes: Some("seal broken".to_string()),
                partial_amount: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(rejected.status, ReturnStatus::Cancelled);
    assert!(rejected.refund_id.is_none());
    let items = order_items_of(&env, completion.order_id).await;
    assert_eq!(items[0].quantity_returned, 0);
}

#[tokio::test]
async fn customer_cannot_cancel_after_pickup() {
    let env = setup().await;
    let user_id = Uuid::new_v4();
    let admin = Uuid::new_v4();
    let completion = env.delivered_order(user_id, dec!(90.00), 1).await;
    let items = order_items_of(&env, completion.order_id).await;

    let request = env
        .returns
        .request(user_id, return_input(completion.order_id, items[0].id, 1))
        .await
        .unwrap();
    env.returns.approve(admin, request.id).await.unwrap();
    env.returns
        .schedule_pickup(
            admin,
            request.id,
            SchedulePickupInput {
                date: Utc::now().date_naive() + Duration::days(2),
                window: "10:00-13:00".to_string(),
            },
        )
        .await
        .unwrap();
    env.returns.mark_picked_up(admin, request.id, None).await.unwrap();

    let result = env.returns.cancel(user_id, request.id).await;
    assert!(matches!(result, Err(OrdersError::InvalidState(_))));
}
