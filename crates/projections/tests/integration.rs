//! Integration tests: events → OrderProjection → queries and live subscriptions.

use std::sync::Arc;

use common::{OrderId, ProductId};
use domain::{FailureKind, Order, OrderEvent, OrderStatus};
use futures_util::{StreamExt, stream};
use projections::{
    IngestError, OrderProjection, ProjectionConfig, SubscriptionError, SubscriptionState,
};
use proptest::prelude::*;

fn projection() -> OrderProjection {
    OrderProjection::new(ProjectionConfig::default())
}

fn shipped_chairs(id: &str) -> Vec<OrderEvent> {
    vec![
        OrderEvent::order_created(id),
        OrderEvent::product_added(id, "chair"),
        OrderEvent::product_count_incremented(id, "chair"),
        OrderEvent::product_count_incremented(id, "chair"),
        OrderEvent::order_confirmed(id),
        OrderEvent::order_shipped(id),
    ]
}

async fn ingest_all(projection: &OrderProjection, events: Vec<OrderEvent>) {
    for event in events {
        projection.ingest(event).await.unwrap();
    }
}

fn chair() -> ProductId {
    ProductId::new("chair")
}

#[tokio::test]
async fn test_ship_order_scenario() {
    let projection = projection();

    ingest_all(&projection, shipped_chairs("O1")).await;

    let order = projection.get_order(&OrderId::new("O1")).await.unwrap();
    assert_eq!(order.status(), OrderStatus::Shipped);
    assert_eq!(order.products().len(), 1);
    assert_eq!(order.quantity_of(&chair()), 3);
    assert_eq!(projection.total_shipped(&chair()).await, 3);
}

#[tokio::test]
async fn test_unshipped_orders_are_excluded_from_total() {
    let projection = projection();
    ingest_all(&projection, shipped_chairs("O1")).await;
    ingest_all(
        &projection,
        vec![
            OrderEvent::order_created("O2"),
            OrderEvent::product_added("O2", "chair"),
            OrderEvent::product_added("O2", "chair2"),
            OrderEvent::order_confirmed("O2"),
        ],
    )
    .await;

    let orders = projection.list_orders().await;
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[1].status(), OrderStatus::Confirmed);
    assert_eq!(orders[1].quantity_of(&chair()), 1);
    assert_eq!(orders[1].quantity_of(&ProductId::new("chair2")), 1);

    assert_eq!(projection.total_shipped(&chair()).await, 3);
    assert_eq!(
        projection
            .total_shipped(&ProductId::new("chair2"))
            .await,
        0
    );
}

#[tokio::test]
async fn test_subscribe_before_creation() {
    let projection = projection();
    let mut subscription = projection.subscribe(OrderId::new("O1")).await.unwrap();
    assert!(subscription.initial().is_none());

    projection
        .ingest(OrderEvent::order_created("O1"))
        .await
        .unwrap();
    projection.shutdown().await;

    let update = subscription.next_update().await.unwrap().unwrap();
    assert_eq!(update.status(), OrderStatus::Created);
    assert!(update.products().is_empty());
    assert!(subscription.next_update().await.is_none());
}

#[tokio::test]
async fn test_subscribe_to_existing_order_gets_current_state_first() {
    let projection = projection();
    ingest_all(
        &projection,
        vec![
            OrderEvent::order_created("O1"),
            OrderEvent::product_added("O1", "chair"),
        ],
    )
    .await;

    let mut subscription = projection.subscribe(OrderId::new("O1")).await.unwrap();
    projection
        .ingest(OrderEvent::order_confirmed("O1"))
        .await
        .unwrap();

    let initial = subscription.initial().unwrap();
    assert_eq!(initial.status(), OrderStatus::Created);
    assert_eq!(initial.quantity_of(&chair()), 1);

    let update = subscription.next_update().await.unwrap().unwrap();
    assert_eq!(update.status(), OrderStatus::Confirmed);
}

#[tokio::test]
async fn test_ship_unconfirmed_order_changes_nothing() {
    let projection = projection();
    ingest_all(
        &projection,
        vec![
            OrderEvent::order_created("O1"),
            OrderEvent::product_added("O1", "chair"),
        ],
    )
    .await;
    let mut subscription = projection.subscribe(OrderId::new("O1")).await.unwrap();
    let before = projection.get_order(&OrderId::new("O1")).await.unwrap();

    let err = projection
        .ingest(OrderEvent::order_shipped("O1"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(FailureKind::InvalidTransition));
    assert_eq!(
        projection.get_order(&OrderId::new("O1")).await.unwrap(),
        before
    );
    assert_eq!(projection.position().events_rejected, 1);

    projection.shutdown().await;
    assert!(subscription.next_update().await.is_none());
}

#[tokio::test]
async fn test_every_subscriber_sees_every_update_in_commit_order() {
    let projection = projection();
    let mut subscriptions = Vec::new();
    for _ in 0..5 {
        subscriptions.push(projection.subscribe(OrderId::new("O1")).await.unwrap());
    }

    ingest_all(&projection, shipped_chairs("O1")).await;
    projection.shutdown().await;

    for subscription in subscriptions {
        let statuses: Vec<(u64, OrderStatus)> = subscription
            .map(|update| {
                let order = update.unwrap();
                (order.version(), order.status())
            })
            .collect()
            .await;
        assert_eq!(
            statuses,
            vec![
                (1, OrderStatus::Created),
                (2, OrderStatus::Created),
                (3, OrderStatus::Created),
                (4, OrderStatus::Created),
                (5, OrderStatus::Confirmed),
                (6, OrderStatus::Shipped),
            ]
        );
    }
}

#[tokio::test]
async fn test_subscribers_only_see_their_order() {
    let projection = projection();
    let mut subscription = projection.subscribe(OrderId::new("O2")).await.unwrap();

    ingest_all(&projection, shipped_chairs("O1")).await;
    projection
        .ingest(OrderEvent::order_created("O2"))
        .await
        .unwrap();

    let update = subscription.next_update().await.unwrap().unwrap();
    assert_eq!(update.order_id(), &OrderId::new("O2"));
    assert_eq!(update.version(), 1);
}

#[tokio::test]
async fn test_slow_subscriber_lags_alone() {
    let projection =
        OrderProjection::new(ProjectionConfig::default().with_subscription_capacity(2));
    let mut fast = projection.subscribe(OrderId::new("O1")).await.unwrap();
    let mut slow = projection.subscribe(OrderId::new("O1")).await.unwrap();

    for event in shipped_chairs("O1") {
        projection.ingest(event).await.unwrap();
        assert!(fast.next_update().await.unwrap().is_ok());
    }

    assert!(slow.next_update().await.unwrap().is_ok());
    assert!(slow.next_update().await.unwrap().is_ok());
    assert!(matches!(
        slow.next_update().await,
        Some(Err(SubscriptionError::Lagged { capacity: 2, .. }))
    ));
    assert!(slow.next_update().await.is_none());
    assert_eq!(slow.state(), SubscriptionState::Closed);
    assert_eq!(projection.registry().subscriber_count(&OrderId::new("O1")), 1);
}

#[tokio::test]
async fn test_cancel_is_effective_immediately() {
    let projection = projection();
    let mut subscription = projection.subscribe(OrderId::new("O1")).await.unwrap();
    projection
        .ingest(OrderEvent::order_created("O1"))
        .await
        .unwrap();

    subscription.cancel();
    projection
        .ingest(OrderEvent::order_confirmed("O1"))
        .await
        .unwrap();

    assert_eq!(subscription.state(), SubscriptionState::Closed);
    assert!(subscription.next_update().await.is_none());
    assert_eq!(projection.registry().active_subscriptions(), 0);
}

#[tokio::test]
async fn test_dropped_subscription_is_released() {
    let projection = projection();
    {
        let _subscription = projection.subscribe(OrderId::new("O1")).await.unwrap();
        assert_eq!(projection.registry().active_subscriptions(), 1);
    }
    assert_eq!(projection.registry().active_subscriptions(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ingestion_across_orders() {
    let projection =
        OrderProjection::new(ProjectionConfig::default().with_workers(4));

    let mut tasks = Vec::new();
    for n in 0..16 {
        let projection = projection.clone();
        tasks.push(tokio::spawn(async move {
            ingest_all(&projection, shipped_chairs(&format!("O{n}"))).await;
        }));
    }

    // Queries run alongside ingestion and never see more than what exists.
    for _ in 0..10 {
        let total = projection.total_shipped(&chair()).await;
        assert!(total <= 48);
        assert_eq!(total % 3, 0);
    }

    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(projection.list_orders().await.len(), 16);
    assert_eq!(projection.total_shipped(&chair()).await, 48);
    assert_eq!(projection.position().events_applied, 96);
}

#[tokio::test]
async fn test_processor_drains_live_feed() {
    let projection = projection();
    let (sender, receiver) = tokio::sync::mpsc::channel::<OrderEvent>(4);
    let feed = stream::unfold(receiver, |mut receiver| async move {
        receiver.recv().await.map(|event| (event, receiver))
    });

    let producer = tokio::spawn(async move {
        for event in shipped_chairs("O1") {
            sender.send(event).await.unwrap();
        }
        sender.send(OrderEvent::order_shipped("O1")).await.unwrap();
    });

    let position = projection.processor().run(feed).await.unwrap();
    producer.await.unwrap();

    assert_eq!(position.events_applied, 6);
    assert_eq!(position.events_rejected, 1);
    assert_eq!(projection.total_shipped(&chair()).await, 3);
}

#[tokio::test]
async fn test_shutdown_drains_queued_events() {
    let projection = projection();
    let mut subscription = projection.subscribe(OrderId::new("O1")).await.unwrap();
    for event in shipped_chairs("O1") {
        projection.submit(event).await.unwrap();
    }

    projection.shutdown().await;

    assert_eq!(projection.total_shipped(&chair()).await, 3);
    let mut delivered = 0;
    while let Some(update) = subscription.next_update().await {
        update.unwrap();
        delivered += 1;
    }
    assert_eq!(delivered, 6);
    assert_eq!(
        projection
            .ingest(OrderEvent::order_created("O2"))
            .await
            .unwrap_err(),
        IngestError::ShuttingDown
    );
}

fn arb_event() -> impl Strategy<Value = OrderEvent> {
    let product = prop::sample::select(vec!["chair", "lamp"]);
    prop_oneof![
        Just(OrderEvent::order_created("O1")),
        product.clone().prop_map(|p| OrderEvent::product_added("O1", p)),
        product
            .clone()
            .prop_map(|p| OrderEvent::product_count_incremented("O1", p)),
        product
            .clone()
            .prop_map(|p| OrderEvent::product_count_decremented("O1", p)),
        product.prop_map(|p| OrderEvent::product_removed("O1", p)),
        Just(OrderEvent::order_confirmed("O1")),
        Just(OrderEvent::order_shipped("O1")),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_one_delivery_per_applied_event(events in prop::collection::vec(arb_event(), 0..40)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (applied, delivered): (Vec<Arc<Order>>, Vec<Arc<Order>>) = runtime.block_on(async {
            let projection = OrderProjection::new(
                ProjectionConfig::default().with_subscription_capacity(64),
            );
            let subscription = projection.subscribe(OrderId::new("O1")).await.unwrap();

            let mut applied = Vec::new();
            for event in events {
                if let Ok(order) = projection.ingest(event).await {
                    applied.push(order);
                }
            }
            projection.shutdown().await;

            let delivered = subscription.map(|update| update.unwrap()).collect().await;
            (applied, delivered)
        });

        prop_assert_eq!(&applied, &delivered);
        for pair in delivered.windows(2) {
            prop_assert_eq!(pair[1].version(), pair[0].version() + 1);
            prop_assert!(pair[0].status() <= pair[1].status());
            // Confirmation is never skipped.
            prop_assert!(
                pair[0].status() != OrderStatus::Created
                    || pair[1].status() != OrderStatus::Shipped
            );
        }
        for order in &delivered {
            prop_assert!(order.products().values().all(|&qty| qty > 0));
        }
    }
}
