mod common;

use std::time::Duration;

use dz_orders_backoffice::{
    error::AppError,
    lifecycle::{Cancellation, CancellationReason, OrderStatus, Outcome, Transition},
    services::expedition::Expedition,
    store::OrderStore,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use common::{FakeCarrier, MemoryOrderStore, carrier_config, confirmed_order, in_flight_order, order};

#[tokio::test]
async fn large_selections_are_split_into_batches_of_100() {
    let orders: Vec<_> = (0..150).map(|_| confirmed_order()).collect();
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let store = MemoryOrderStore::with_orders(orders);
    let carrier = FakeCarrier::new();
    let config = carrier_config();

    let report = Expedition::new(&store, &carrier, &config)
        .expediate(&ids, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(carrier.batch_sizes().await, vec![100, 50]);
    assert_eq!(report.batches, 2);
    assert_eq!(report.successful.len(), 150);
    assert!(report.failed.is_empty());

    let sent = store.get(ids[149]).await.unwrap();
    assert_eq!(sent.status, OrderStatus::Sent);
    assert!(sent.tracking_number.is_some());
}

#[tokio::test]
async fn already_sent_orders_are_not_resubmitted() {
    let fresh = confirmed_order();
    let sent = in_flight_order(OrderStatus::Sent, "ECO-OLD");
    let ids = vec![fresh.id, sent.id];
    let store = MemoryOrderStore::with_orders([fresh, sent.clone()]);
    let carrier = FakeCarrier::new();
    let config = carrier_config();
    let expedition = Expedition::new(&store, &carrier, &config);

    let first = expedition.expediate(&ids, &CancellationToken::new()).await.unwrap();
    assert_eq!(first.successful.len(), 1);
    assert_eq!(first.already_sent, vec![sent.id]);

    let second = expedition.expediate(&ids, &CancellationToken::new()).await.unwrap();
    assert!(second.successful.is_empty());
    assert_eq!(second.already_sent.len(), 2);
    assert_eq!(carrier.batch_sizes().await, vec![1]);
    assert_eq!(
        store.get(sent.id).await.unwrap().carrier_order_id.as_deref(),
        Some("ECO-OLD")
    );
}

#[tokio::test]
async fn a_failed_batch_does_not_affect_the_others() {
    let orders: Vec<_> = (0..120).map(|_| confirmed_order()).collect();
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let store = MemoryOrderStore::with_orders(orders);
    let carrier = FakeCarrier::new().failing_batch(0);
    let config = carrier_config();

    let report = Expedition::new(&store, &carrier, &config)
        .expediate(&ids, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.failed.len(), 100);
    assert_eq!(report.successful.len(), 20);
    assert_eq!(store.get(ids[0]).await.unwrap().status, OrderStatus::Confirmed);
    assert_eq!(store.get(ids[119]).await.unwrap().status, OrderStatus::Sent);
}

#[tokio::test]
async fn per_order_rejections_are_isolated() {
    let good = confirmed_order();
    let bad = confirmed_order();
    let carrier = FakeCarrier::new().rejecting(&bad.order_number);
    let ids = vec![good.id, bad.id];
    let store = MemoryOrderStore::with_orders([good.clone(), bad.clone()]);
    let config = carrier_config();

    let report = Expedition::new(&store, &carrier, &config)
        .expediate(&ids, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.successful.len(), 1);
    assert_eq!(report.successful[0].order_id, good.id);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].order_id, bad.id);
    assert_eq!(report.failed[0].reason, "invalid phone");
    assert_eq!(store.get(bad.id).await.unwrap().status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn pending_and_unknown_orders_are_reported_not_sent() {
    let pending = order();
    let missing = Uuid::new_v4();
    let ids = vec![pending.id, missing, pending.id];
    let store = MemoryOrderStore::with_orders([pending.clone()]);
    let carrier = FakeCarrier::new();
    let config = carrier_config();

    let report = Expedition::new(&store, &carrier, &config)
        .expediate(&ids, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].status, OrderStatus::Pending);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].order_id, missing);
    assert!(carrier.batch_sizes().await.is_empty());
}

#[tokio::test]
async fn cancelled_token_stops_before_submission() {
    let orders: Vec<_> = (0..3).map(|_| confirmed_order()).collect();
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let store = MemoryOrderStore::with_orders(orders);
    let carrier = FakeCarrier::new();
    let config = carrier_config();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = Expedition::new(&store, &carrier, &config)
        .expediate(&ids, &cancel)
        .await
        .unwrap();

    assert_eq!(report.failed.len(), 3);
    assert!(carrier.batch_sizes().await.is_empty());
}

#[tokio::test]
async fn single_send_uses_the_single_endpoint_once() {
    let order = confirmed_order();
    let id = order.id;
    let store = MemoryOrderStore::with_orders([order]);
    let carrier = FakeCarrier::new();
    let config = carrier_config();
    let expedition = Expedition::new(&store, &carrier, &config);

    let (sent, outcome) = expedition.expediate_one(id).await.unwrap();
    assert!(outcome.is_applied());
    assert_eq!(sent.status, OrderStatus::Sent);

    let (again, outcome) = expedition.expediate_one(id).await.unwrap();
    assert_eq!(outcome, Outcome::Unchanged);
    assert_eq!(again.tracking_number, sent.tracking_number);
    assert_eq!(carrier.single_calls(), 1);
}

#[tokio::test]
async fn single_send_of_a_pending_order_is_a_conflict() {
    let order = order();
    let id = order.id;
    let store = MemoryOrderStore::with_orders([order]);
    let carrier = FakeCarrier::new();
    let config = carrier_config();

    let err = Expedition::new(&store, &carrier, &config)
        .expediate_one(id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));
    assert_eq!(carrier.single_calls(), 0);
}

#[tokio::test]
async fn overlapping_bulk_sends_create_one_shipment() {
    let order = confirmed_order();
    let id = order.id;
    let store = MemoryOrderStore::with_orders([order]);
    let carrier = FakeCarrier::new().with_latency(Duration::from_millis(50));
    let config = carrier_config();
    let first = Expedition::new(&store, &carrier, &config);
    let second = Expedition::new(&store, &carrier, &config);
    let cancel = CancellationToken::new();
    let ids = [id];

    let (a, b) = tokio::join!(first.expediate(&ids, &cancel), second.expediate(&ids, &cancel));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(carrier.batch_sizes().await, vec![1]);
    assert_eq!(carrier.issued(), 1);
    assert_eq!(a.successful.len() + b.successful.len(), 1);
    assert_eq!(a.in_progress.len() + b.in_progress.len(), 1);
    assert!(a.orphaned.is_empty() && b.orphaned.is_empty());
    assert_eq!(store.get(id).await.unwrap().status, OrderStatus::Sent);
    assert!(!store.is_claimed(id).await);
}

#[tokio::test]
async fn bulk_send_racing_a_single_send_creates_one_shipment() {
    let order = confirmed_order();
    let id = order.id;
    let store = MemoryOrderStore::with_orders([order]);
    let carrier = FakeCarrier::new().with_latency(Duration::from_millis(50));
    let config = carrier_config();
    let bulk = Expedition::new(&store, &carrier, &config);
    let single = Expedition::new(&store, &carrier, &config);

    let ids = [id];
    let cancel = CancellationToken::new();
    let (report, one) = tokio::join!(
        bulk.expediate(&ids, &cancel),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            single.expediate_one(id).await
        }
    );

    assert_eq!(carrier.issued(), 1);
    assert_eq!(report.unwrap().successful.len(), 1);
    assert!(matches!(one, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn an_order_being_sent_cannot_be_cancelled() {
    let order = confirmed_order();
    let id = order.id;
    let store = MemoryOrderStore::with_orders([order]);

    assert_eq!(store.claim_for_expedition(&[id]).await.unwrap(), vec![id]);
    let cancel = Transition::Cancel(Cancellation {
        reason: CancellationReason::CancelledByAdmin,
        notes: None,
        cancelled_by: None,
    });
    let err = store.apply_transition(id, cancel.clone()).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    store.release_claims(&[id]).await.unwrap();
    let result = store.apply_transition(id, cancel).await.unwrap();
    assert!(result.outcome.is_applied());
}

#[tokio::test]
async fn failed_submissions_can_be_retried() {
    let order = confirmed_order();
    let id = order.id;
    let store = MemoryOrderStore::with_orders([order]);
    let carrier = FakeCarrier::new().failing_batch(0);
    let config = carrier_config();
    let expedition = Expedition::new(&store, &carrier, &config);

    let first = expedition.expediate(&[id], &CancellationToken::new()).await.unwrap();
    assert_eq!(first.failed.len(), 1);
    assert!(!store.is_claimed(id).await);

    let second = expedition.expediate(&[id], &CancellationToken::new()).await.unwrap();
    assert_eq!(second.successful.len(), 1);
    assert_eq!(carrier.batch_sizes().await, vec![1, 1]);
}

#[tokio::test]
async fn unreadable_batch_answers_keep_orders_claimed() {
    let order = confirmed_order();
    let id = order.id;
    let store = MemoryOrderStore::with_orders([order]);
    let carrier = FakeCarrier::new().garbled_batch(0);
    let config = carrier_config();
    let expedition = Expedition::new(&store, &carrier, &config);

    let first = expedition.expediate(&[id], &CancellationToken::new()).await.unwrap();
    assert_eq!(first.failed.len(), 1);
    assert!(first.failed[0].reason.contains("may exist at the carrier"));
    assert!(store.is_claimed(id).await);

    let second = expedition.expediate(&[id], &CancellationToken::new()).await.unwrap();
    assert_eq!(second.in_progress, vec![id]);
    assert_eq!(carrier.batch_sizes().await, vec![1]);
}
