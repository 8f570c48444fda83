//! In-memory broker implementing the full [`BrokerChannel`] port.
//!
//! Faithful to the semantics the production AMQP adapter delegates to a
//! real broker, so choreography tests exercise the same contract:
//!
//! - topic routing with `*` (one word) and `#` (zero or more words)
//! - convergent declarations; conflicting redeclaration fails
//! - manual acknowledgement with channel-scoped delivery tags
//! - `nack(requeue=true)` puts the message back at the front of its queue
//!   for immediate redelivery, with the redelivered flag set
//! - `nack(requeue=false)` forwards to the queue's dead-letter exchange,
//!   or drops the message if the queue has none
//!
//! Everything is synchronous under one mutex; deliveries flow through
//! unbounded channels so no lock is held across an await.

use shopwire_core::broker::{
    BoxFuture, BrokerChannel, BrokerError, BrokerResult, Delivery, DeliveryStream,
    PublishProperties,
};
use shopwire_core::topology::{Binding, ExchangeKind, ExchangeSpec, QueueSpec};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Match an AMQP topic pattern against a routing key.
///
/// `*` matches exactly one dot-separated word, `#` matches zero or more.
#[must_use]
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    matches_words(&pattern, &key)
}

fn matches_words(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => {
            (0..=key.len()).any(|skip| matches_words(rest, &key[skip..]))
        }
        Some((&"*", rest)) => match key.split_first() {
            Some((_, key_rest)) => matches_words(rest, key_rest),
            None => false,
        },
        Some((word, rest)) => match key.split_first() {
            Some((first, key_rest)) if first == word => matches_words(rest, key_rest),
            _ => false,
        },
    }
}

#[derive(Clone, Debug)]
struct Message {
    exchange: String,
    routing_key: String,
    payload: Vec<u8>,
    message_id: Option<String>,
    redeliveries: u32,
}

struct QueueState {
    spec: QueueSpec,
    buffer: VecDeque<Message>,
    consumer: Option<mpsc::UnboundedSender<Result<Delivery, BrokerError>>>,
}

struct Pending {
    queue: String,
    message: Message,
}

#[derive(Default)]
struct BrokerState {
    exchanges: HashMap<String, ExchangeSpec>,
    queues: HashMap<String, QueueState>,
    bindings: Vec<Binding>,
    unacked: HashMap<u64, Pending>,
    next_tag: u64,
}

impl BrokerState {
    fn deliver(&mut self, queue_name: &str, message: Message, front: bool) {
        let consumer = match self.queues.get(queue_name) {
            Some(queue) => queue.consumer.clone(),
            None => return,
        };
        if let Some(consumer) = consumer {
            self.next_tag += 1;
            let tag = self.next_tag;
            let delivery = Delivery {
                delivery_tag: tag,
                exchange: message.exchange.clone(),
                routing_key: message.routing_key.clone(),
                payload: message.payload.clone(),
                message_id: message.message_id.clone(),
                redelivered: message.redeliveries > 0,
            };
            if consumer.send(Ok(delivery)).is_ok() {
                self.unacked.insert(
                    tag,
                    Pending {
                        queue: queue_name.to_string(),
                        message,
                    },
                );
                return;
            }
            // Consumer side dropped its stream: detach and buffer instead.
            if let Some(queue) = self.queues.get_mut(queue_name) {
                queue.consumer = None;
            }
        }
        if let Some(queue) = self.queues.get_mut(queue_name) {
            if front {
                queue.buffer.push_front(message);
            } else {
                queue.buffer.push_back(message);
            }
        }
    }

    fn route(&mut self, exchange: &str, routing_key: &str, message: &Message) -> BrokerResult<()> {
        let Some(spec) = self.exchanges.get(exchange) else {
            return Err(BrokerError::UnknownExchange(exchange.to_string()));
        };
        let kind = spec.kind;
        let targets: Vec<String> = self
            .bindings
            .iter()
            .filter(|binding| binding.exchange == exchange)
            .filter(|binding| match kind {
                ExchangeKind::Topic => topic_matches(&binding.routing_key, routing_key),
                ExchangeKind::Direct => binding.routing_key == routing_key,
                ExchangeKind::Fanout => true,
            })
            .map(|binding| binding.queue.clone())
            .collect();

        let mut seen = Vec::new();
        for queue in targets {
            if seen.contains(&queue) {
                continue;
            }
            seen.push(queue.clone());
            self.deliver(&queue, message.clone(), false);
        }
        Ok(())
    }
}

/// In-memory broker channel.
///
/// `Clone` shares the same broker state, so a test can hand one clone to a
/// publisher and another to a dispatcher and observe the full round trip.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    /// Create an empty broker with no declarations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::unwrap_used)]
    fn lock(&self) -> std::sync::MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap()
    }

    /// Number of messages buffered (not in flight) on a queue.
    #[must_use]
    pub fn queue_depth(&self, queue: &str) -> usize {
        self.lock()
            .queues
            .get(queue)
            .map_or(0, |q| q.buffer.len())
    }

    /// Buffered payloads on a queue, front first (for assertions).
    #[must_use]
    pub fn buffered_payloads(&self, queue: &str) -> Vec<Vec<u8>> {
        self.lock().queues.get(queue).map_or_else(Vec::new, |q| {
            q.buffer.iter().map(|m| m.payload.clone()).collect()
        })
    }

    /// Number of deliveries handed out but not yet settled.
    #[must_use]
    pub fn unacked_count(&self) -> usize {
        self.lock().unacked.len()
    }
}

impl BrokerChannel for InMemoryBroker {
    fn declare_exchange<'a>(&'a self, spec: &'a ExchangeSpec) -> BoxFuture<'a, BrokerResult<()>> {
        Box::pin(async move {
            let mut state = self.lock();
            match state.exchanges.get(&spec.name) {
                Some(existing) if existing == spec => Ok(()),
                Some(existing) => Err(BrokerError::PreconditionFailed {
                    object: spec.name.clone(),
                    reason: format!("declared as {existing:?}, redeclared as {spec:?}"),
                }),
                None => {
                    state.exchanges.insert(spec.name.clone(), spec.clone());
                    Ok(())
                }
            }
        })
    }

    fn declare_queue<'a>(&'a self, spec: &'a QueueSpec) -> BoxFuture<'a, BrokerResult<()>> {
        Box::pin(async move {
            let mut state = self.lock();
            match state.queues.get(&spec.name) {
                Some(existing) if existing.spec == *spec => Ok(()),
                Some(existing) => Err(BrokerError::PreconditionFailed {
                    object: spec.name.clone(),
                    reason: format!("declared as {:?}, redeclared as {spec:?}", existing.spec),
                }),
                None => {
                    state.queues.insert(
                        spec.name.clone(),
                        QueueState {
                            spec: spec.clone(),
                            buffer: VecDeque::new(),
                            consumer: None,
                        },
                    );
                    Ok(())
                }
            }
        })
    }

    fn bind_queue<'a>(&'a self, binding: &'a Binding) -> BoxFuture<'a, BrokerResult<()>> {
        Box::pin(async move {
            let mut state = self.lock();
            if !state.exchanges.contains_key(&binding.exchange) {
                return Err(BrokerError::UnknownExchange(binding.exchange.clone()));
            }
            if !state.queues.contains_key(&binding.queue) {
                return Err(BrokerError::UnknownQueue(binding.queue.clone()));
            }
            if !state.bindings.contains(binding) {
                state.bindings.push(binding.clone());
            }
            Ok(())
        })
    }

    fn publish<'a>(
        &'a self,
        exchange: &'a str,
        routing_key: &'a str,
        properties: PublishProperties,
        payload: &'a [u8],
    ) -> BoxFuture<'a, BrokerResult<()>> {
        Box::pin(async move {
            let message = Message {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                payload: payload.to_vec(),
                message_id: properties.message_id,
                redeliveries: 0,
            };
            self.lock().route(exchange, routing_key, &message)
        })
    }

    fn consume<'a>(
        &'a self,
        queue: &'a str,
        _consumer_tag: &'a str,
    ) -> BoxFuture<'a, BrokerResult<DeliveryStream>> {
        Box::pin(async move {
            let (tx, rx) = mpsc::unbounded_channel();
            {
                let mut state = self.lock();
                if !state.queues.contains_key(queue) {
                    return Err(BrokerError::UnknownQueue(queue.to_string()));
                }
                if let Some(existing) = state.queues.get_mut(queue) {
                    existing.consumer = Some(tx);
                }
                // Hand out everything that accumulated before the consumer
                // arrived, in order.
                let backlog: Vec<Message> = state
                    .queues
                    .get_mut(queue)
                    .map(|q| q.buffer.drain(..).collect())
                    .unwrap_or_default();
                for message in backlog {
                    state.deliver(queue, message, false);
                }
            }
            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(item) = rx.recv().await {
                    yield item;
                }
            };
            Ok(Box::pin(stream) as DeliveryStream)
        })
    }

    fn ack(&self, delivery_tag: u64) -> BoxFuture<'_, BrokerResult<()>> {
        Box::pin(async move {
            let mut state = self.lock();
            if state.unacked.remove(&delivery_tag).is_none() {
                return Err(BrokerError::AckFailed {
                    delivery_tag,
                    reason: "unknown delivery tag".to_string(),
                });
            }
            Ok(())
        })
    }

    fn nack(&self, delivery_tag: u64, requeue: bool) -> BoxFuture<'_, BrokerResult<()>> {
        Box::pin(async move {
            let mut state = self.lock();
            let Some(pending) = state.unacked.remove(&delivery_tag) else {
                return Err(BrokerError::AckFailed {
                    delivery_tag,
                    reason: "unknown delivery tag".to_string(),
                });
            };

            if requeue {
                let mut message = pending.message;
                message.redeliveries += 1;
                state.deliver(&pending.queue, message, true);
                return Ok(());
            }

            let dead_letter = state
                .queues
                .get(&pending.queue)
                .and_then(|q| q.spec.dead_letter.clone());
            match dead_letter {
                Some(dl) => {
                    let mut message = pending.message;
                    message.exchange = dl.exchange.clone();
                    message.routing_key = dl.routing_key.clone();
                    message.redeliveries = 0;
                    // A missing dead-letter exchange drops the message,
                    // exactly like a broker with no matching route.
                    let _ = state.route(&dl.exchange, &dl.routing_key, &message);
                }
                None => {
                    tracing::debug!(
                        queue = %pending.queue,
                        routing_key = %pending.message.routing_key,
                        "rejected message dropped (no dead-letter exchange)"
                    );
                }
            }
            Ok(())
        })
    }
}
