//! Port-level semantics of the in-memory broker, exercised the way the
//! dispatcher and publisher exercise a real one.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use futures::StreamExt;
use shopwire_core::broker::{BrokerChannel, BrokerError, BoxFuture, Delivery, PublishProperties};
use shopwire_core::dispatcher::{Dispatcher, RetryPolicy};
use shopwire_core::handler::{EventHandler, HandlerError, HandlerResult};
use shopwire_core::topology::{
    CART_EXCHANGE, CART_ITEM_ADDED_KEY, DEAD_LETTER_QUEUE, ExchangeKind, ExchangeSpec, QueueSpec,
    Topology,
};
use shopwire_testing::InMemoryBroker;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

const ITEM_QUEUE: &str = "cart_item_added_queue";

async fn declared_broker() -> InMemoryBroker {
    let broker = InMemoryBroker::new();
    Topology::new()
        .with_dead_lettering()
        .exchange(ExchangeSpec::topic(CART_EXCHANGE))
        .consuming_queue(ITEM_QUEUE, CART_EXCHANGE, CART_ITEM_ADDED_KEY)
        .declare(&broker)
        .await
        .expect("topology declares");
    broker
}

async fn publish(broker: &InMemoryBroker, exchange: &str, key: &str, payload: &[u8]) {
    broker
        .publish(
            exchange,
            key,
            PublishProperties::persistent_json(format!("msg-{key}-{}", payload.len())),
            payload,
        )
        .await
        .expect("publish accepted");
}

/// Poll until `predicate` holds or the budget elapses.
async fn wait_until(predicate: impl Fn() -> bool) {
    for _ in 0..400 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(predicate(), "condition not reached within budget");
}

#[tokio::test]
async fn publish_routes_to_bound_queue() {
    let broker = declared_broker().await;
    publish(&broker, CART_EXCHANGE, CART_ITEM_ADDED_KEY, b"{\"k\":1}").await;
    assert_eq!(broker.queue_depth(ITEM_QUEUE), 1);

    let mut stream = broker
        .consume(ITEM_QUEUE, "t")
        .await
        .expect("consume starts");
    let delivery = stream.next().await.expect("delivery").expect("ok");
    assert_eq!(delivery.routing_key, CART_ITEM_ADDED_KEY);
    assert_eq!(delivery.payload, b"{\"k\":1}");
    assert!(!delivery.redelivered);
    assert_eq!(broker.unacked_count(), 1);

    broker.ack(delivery.delivery_tag).await.expect("ack");
    assert_eq!(broker.unacked_count(), 0);
}

#[tokio::test]
async fn publish_to_undeclared_exchange_is_a_hard_error() {
    let broker = InMemoryBroker::new();
    let result = broker
        .publish("nowhere.exchange", "some.key", PublishProperties::default(), b"{}")
        .await;
    assert!(matches!(result, Err(BrokerError::UnknownExchange(_))));
}

#[tokio::test]
async fn unmatched_routing_key_reaches_no_queue() {
    let broker = declared_broker().await;
    publish(&broker, CART_EXCHANGE, "cart.cleared", b"{}").await;
    assert_eq!(broker.queue_depth(ITEM_QUEUE), 0);
}

#[tokio::test]
async fn conflicting_redeclaration_fails_loudly() {
    let broker = declared_broker().await;

    // Same parameters: convergent no-op.
    broker
        .declare_exchange(&ExchangeSpec::topic(CART_EXCHANGE))
        .await
        .expect("identical redeclaration is fine");

    // Different kind: configuration error.
    let conflicting = ExchangeSpec {
        name: CART_EXCHANGE.to_string(),
        kind: ExchangeKind::Direct,
        durable: true,
    };
    let result = broker.declare_exchange(&conflicting).await;
    assert!(matches!(result, Err(BrokerError::PreconditionFailed { .. })));

    // Queues converge the same way.
    let result = broker.declare_queue(&QueueSpec::durable(ITEM_QUEUE)).await;
    assert!(
        matches!(result, Err(BrokerError::PreconditionFailed { .. })),
        "missing dead-letter arguments must not pass silently"
    );
}

#[tokio::test]
async fn nack_with_requeue_redelivers_immediately_and_marks_it() {
    let broker = declared_broker().await;
    publish(&broker, CART_EXCHANGE, CART_ITEM_ADDED_KEY, b"{}").await;

    let mut stream = broker.consume(ITEM_QUEUE, "t").await.expect("consume");
    let first = stream.next().await.expect("delivery").expect("ok");
    assert!(!first.redelivered);

    broker.nack(first.delivery_tag, true).await.expect("nack");
    let second = stream.next().await.expect("redelivery").expect("ok");
    assert!(second.redelivered);
    assert_eq!(second.payload, first.payload);
    assert_ne!(second.delivery_tag, first.delivery_tag);
}

#[tokio::test]
async fn reject_without_requeue_dead_letters_with_dlx_key() {
    let broker = declared_broker().await;
    publish(&broker, CART_EXCHANGE, CART_ITEM_ADDED_KEY, b"not json").await;

    let mut stream = broker.consume(ITEM_QUEUE, "t").await.expect("consume");
    let delivery = stream.next().await.expect("delivery").expect("ok");
    broker.nack(delivery.delivery_tag, false).await.expect("reject");

    // Lands on the dead-letter queue under the rewritten key, and never
    // returns to the origin queue.
    assert_eq!(broker.queue_depth(DEAD_LETTER_QUEUE), 1);
    assert_eq!(broker.queue_depth(ITEM_QUEUE), 0);

    let mut dlq = broker
        .consume(DEAD_LETTER_QUEUE, "dlq")
        .await
        .expect("consume dlq");
    let dead = dlq.next().await.expect("dead letter").expect("ok");
    assert_eq!(dead.routing_key, "cart.item_added.dlx");
    assert_eq!(dead.payload, b"not json");
}

#[tokio::test]
async fn backlog_is_delivered_when_a_consumer_attaches() {
    let broker = declared_broker().await;
    publish(&broker, CART_EXCHANGE, CART_ITEM_ADDED_KEY, b"{\"n\":1}").await;
    publish(&broker, CART_EXCHANGE, CART_ITEM_ADDED_KEY, b"{\"n\":2}").await;

    let mut stream = broker.consume(ITEM_QUEUE, "t").await.expect("consume");
    let first = stream.next().await.expect("first").expect("ok");
    let second = stream.next().await.expect("second").expect("ok");
    assert_eq!(first.payload, b"{\"n\":1}");
    assert_eq!(second.payload, b"{\"n\":2}");
}

struct FailingHandler {
    attempts: Arc<AtomicU32>,
}

impl EventHandler for FailingHandler {
    fn queue(&self) -> &str {
        ITEM_QUEUE
    }

    fn handle<'a>(&'a self, _delivery: &'a Delivery) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(HandlerError::Transient("storage unavailable".to_string()))
        })
    }
}

#[tokio::test]
async fn dispatcher_retries_transient_failures_then_dead_letters() {
    let broker = declared_broker().await;
    let attempts = Arc::new(AtomicU32::new(0));
    let handler = Arc::new(FailingHandler {
        attempts: Arc::clone(&attempts),
    });

    let channel: Arc<dyn BrokerChannel> = Arc::new(broker.clone());
    let handle = Dispatcher::new(channel, RetryPolicy::new(3))
        .register(handler)
        .run()
        .await
        .expect("dispatcher runs");

    publish(&broker, CART_EXCHANGE, CART_ITEM_ADDED_KEY, b"{}").await;

    let dlq_broker = broker.clone();
    wait_until(move || dlq_broker.queue_depth(DEAD_LETTER_QUEUE) == 1).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(broker.queue_depth(ITEM_QUEUE), 0);
    assert_eq!(broker.unacked_count(), 0);

    handle.shutdown().await.expect("clean shutdown");
}

struct CountingHandler {
    handled: Arc<AtomicU32>,
}

impl EventHandler for CountingHandler {
    fn queue(&self) -> &str {
        ITEM_QUEUE
    }

    fn handle<'a>(&'a self, _delivery: &'a Delivery) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            self.handled.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

#[tokio::test]
async fn dispatcher_acks_successful_deliveries_and_shuts_down_cleanly() {
    let broker = declared_broker().await;
    let handled = Arc::new(AtomicU32::new(0));
    let handler = Arc::new(CountingHandler {
        handled: Arc::clone(&handled),
    });

    let channel: Arc<dyn BrokerChannel> = Arc::new(broker.clone());
    let handle = Dispatcher::new(channel, RetryPolicy::default())
        .register(handler)
        .run()
        .await
        .expect("dispatcher runs");

    for n in 0..3 {
        publish(
            &broker,
            CART_EXCHANGE,
            CART_ITEM_ADDED_KEY,
            format!("{{\"n\":{n}}}").as_bytes(),
        )
        .await;
    }

    let counter = Arc::clone(&handled);
    wait_until(move || counter.load(Ordering::SeqCst) == 3).await;
    assert_eq!(broker.unacked_count(), 0);

    handle.shutdown().await.expect("clean shutdown");
}
