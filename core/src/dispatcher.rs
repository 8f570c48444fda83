//! Consumer dispatcher: queue subscriptions, manual acknowledgement and
//! bounded retry.
//!
//! The dispatcher owns one broker channel and one subscription per event
//! type of interest. Each subscription runs on its own task, so one
//! handler's failure never blocks delivery to a sibling; within a single
//! queue, deliveries are processed strictly one at a time (per-queue FIFO).
//!
//! # Per-message state machine
//!
//! ```text
//! Received ──► Processing ──► Acked                  (handler Ok, or NotFound drop)
//!                   │
//!                   ├───────► Requeued               (Transient, attempts < max)
//!                   │
//!                   └───────► Dead-lettered          (Permanent, or Transient at max)
//! ```
//!
//! Requeue means immediate redelivery with no backoff. Left unbounded that
//! loops forever on a deterministically failing message, so the dispatcher
//! counts attempts per message id and rejects without requeue once
//! [`RetryPolicy::max_attempts`] is reached; the queue's dead-letter
//! declaration then routes the message to the dead-letter exchange.
//!
//! # Shutdown
//!
//! [`DispatcherHandle::shutdown`] stops intake on every subscription,
//! lets in-flight handlers finish, and releases the channel. Unacked
//! messages redeliver safely afterwards - that is at-least-once delivery
//! working as intended, not a defect.

use crate::broker::{BrokerChannel, BrokerError, BrokerResult, Delivery, DeliveryStream};
use crate::handler::{EventHandler, HandlerError, HandlerResult};
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Bounded-retry policy for transient handler failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delivery attempts (first try included) before dead-lettering.
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Create a policy with the given attempt ceiling.
    #[must_use]
    pub const fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

/// What the dispatcher does with a delivery after its handler ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge: handled, or dropped as unresolvable.
    Ack,
    /// Negative-acknowledge with requeue for immediate redelivery.
    Requeue,
    /// Negative-acknowledge without requeue; the broker dead-letters it.
    DeadLetter,
}

/// Map a handler outcome and the attempt count to a disposition.
///
/// This is the single place the error taxonomy is interpreted; handlers
/// never talk to the channel themselves.
#[must_use]
pub fn disposition(outcome: &HandlerResult, attempts: u32, policy: RetryPolicy) -> Disposition {
    match outcome {
        Ok(()) | Err(HandlerError::NotFound(_)) => Disposition::Ack,
        Err(HandlerError::Permanent(_)) => Disposition::DeadLetter,
        Err(HandlerError::Transient(_)) => {
            if attempts >= policy.max_attempts {
                Disposition::DeadLetter
            } else {
                Disposition::Requeue
            }
        }
    }
}

/// Per-message failure counter, keyed by publisher-stamped message id.
///
/// Size-bounded: once `capacity` distinct ids are tracked, the oldest is
/// evicted. A message without an id cannot be counted across redeliveries,
/// so it gets exactly one requeue (the broker's redelivered flag marks the
/// second attempt) before dead-lettering.
struct AttemptTracker {
    counts: HashMap<String, u32>,
    order: VecDeque<String>,
    capacity: usize,
}

impl AttemptTracker {
    fn new(capacity: usize) -> Self {
        Self {
            counts: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Record a failed attempt and return the total for this message.
    fn failure(&mut self, delivery: &Delivery, ceiling: u32) -> u32 {
        match &delivery.message_id {
            Some(id) => {
                if !self.counts.contains_key(id) {
                    if self.order.len() >= self.capacity {
                        if let Some(evicted) = self.order.pop_front() {
                            self.counts.remove(&evicted);
                        }
                    }
                    self.order.push_back(id.clone());
                }
                let count = self.counts.entry(id.clone()).or_insert(0);
                *count += 1;
                *count
            }
            // No id to correlate redeliveries by: first failure earns one
            // requeue, a redelivered failure exhausts the budget.
            None => {
                if delivery.redelivered {
                    ceiling
                } else {
                    1
                }
            }
        }
    }

    /// Forget a message once it is settled for good.
    fn settle(&mut self, delivery: &Delivery) {
        if let Some(id) = &delivery.message_id {
            if self.counts.remove(id).is_some() {
                self.order.retain(|tracked| tracked != id);
            }
        }
    }
}

/// Routes queue deliveries to registered handlers.
///
/// # Example
///
/// ```no_run
/// use shopwire_core::dispatcher::{Dispatcher, RetryPolicy};
/// # use shopwire_core::broker::BrokerChannel;
/// # use shopwire_core::handler::EventHandler;
/// # use std::sync::Arc;
///
/// # async fn example(
/// #     channel: Arc<dyn BrokerChannel>,
/// #     handler: Arc<dyn EventHandler>,
/// # ) -> Result<(), Box<dyn std::error::Error>> {
/// let handle = Dispatcher::new(channel, RetryPolicy::default())
///     .register(handler)
///     .run()
///     .await?;
/// // ... on service shutdown:
/// handle.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher {
    channel: Arc<dyn BrokerChannel>,
    handlers: Vec<Arc<dyn EventHandler>>,
    policy: RetryPolicy,
}

impl Dispatcher {
    /// Create a dispatcher over an already-declared topology.
    #[must_use]
    pub fn new(channel: Arc<dyn BrokerChannel>, policy: RetryPolicy) -> Self {
        Self {
            channel,
            handlers: Vec::new(),
            policy,
        }
    }

    /// Register a handler for the queue it names.
    #[must_use]
    pub fn register(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Subscribe every registered handler and start delivering.
    ///
    /// Returns a handle owning the subscription tasks. Each subscription
    /// consumes with manual acknowledgement and settles every delivery
    /// exactly once.
    ///
    /// # Errors
    ///
    /// Returns the first subscription failure; queues must exist (declare
    /// the topology first).
    pub async fn run(self) -> BrokerResult<DispatcherHandle> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        for handler in self.handlers {
            let queue = handler.queue().to_string();
            let consumer_tag = format!("shopwire-{queue}");
            let stream = self.channel.consume(&queue, &consumer_tag).await?;
            tracing::info!(queue = %queue, "subscription started");

            tasks.spawn(subscription_loop(
                Arc::clone(&self.channel),
                handler,
                stream,
                shutdown_rx.clone(),
                self.policy,
            ));
        }

        Ok(DispatcherHandle { shutdown_tx, tasks })
    }
}

/// Running subscriptions, owned by the service until shutdown.
pub struct DispatcherHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: JoinSet<BrokerResult<()>>,
}

impl DispatcherHandle {
    /// Stop intake, let in-flight handlers finish, release the channel.
    ///
    /// # Errors
    ///
    /// Returns the first error a subscription task ended with; transport
    /// errors here mean the connection died before shutdown and the
    /// process should be restarted by its supervisor.
    pub async fn shutdown(mut self) -> BrokerResult<()> {
        // Receivers only observe the value; send failure just means every
        // subscription already ended.
        let _ = self.shutdown_tx.send(true);
        self.drain().await
    }

    /// Wait for subscriptions to end on their own (connection loss or
    /// stream close), propagating the first failure.
    ///
    /// # Errors
    ///
    /// Returns the error the first failing subscription task ended with.
    pub async fn join(mut self) -> BrokerResult<()> {
        self.drain().await
    }

    async fn drain(&mut self) -> BrokerResult<()> {
        let mut first_error = None;
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(join_error) => {
                    if first_error.is_none() {
                        first_error = Some(BrokerError::TransportError(format!(
                            "subscription task failed: {join_error}"
                        )));
                    }
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn subscription_loop(
    channel: Arc<dyn BrokerChannel>,
    handler: Arc<dyn EventHandler>,
    mut stream: DeliveryStream,
    mut shutdown: watch::Receiver<bool>,
    policy: RetryPolicy,
) -> BrokerResult<()> {
    let queue = handler.queue().to_string();
    let mut attempts = AttemptTracker::new(10_000);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!(queue = %queue, "subscription stopping");
                    return Ok(());
                }
            }
            next = stream.next() => {
                match next {
                    None => {
                        tracing::info!(queue = %queue, "delivery stream closed");
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        // Fail fast: a broken transport with possibly stale
                        // topology is not something to paper over in-process.
                        tracing::error!(queue = %queue, error = %e, "delivery stream failed");
                        return Err(e);
                    }
                    Some(Ok(delivery)) => {
                        settle_delivery(&*channel, &*handler, &queue, &delivery, &mut attempts, policy)
                            .await?;
                    }
                }
            }
        }
    }
}

async fn settle_delivery(
    channel: &dyn BrokerChannel,
    handler: &dyn EventHandler,
    queue: &str,
    delivery: &Delivery,
    attempts: &mut AttemptTracker,
    policy: RetryPolicy,
) -> BrokerResult<()> {
    let outcome = handler.handle(delivery).await;
    let attempt = if outcome.is_err() {
        attempts.failure(delivery, policy.max_attempts)
    } else {
        0
    };

    match disposition(&outcome, attempt, policy) {
        Disposition::Ack => {
            if let Err(HandlerError::NotFound(reason)) = &outcome {
                tracing::warn!(
                    queue = %queue,
                    routing_key = %delivery.routing_key,
                    reason = %reason,
                    "delivery dropped: referenced entity is gone"
                );
            }
            channel.ack(delivery.delivery_tag).await?;
            attempts.settle(delivery);
        }
        Disposition::Requeue => {
            tracing::warn!(
                queue = %queue,
                routing_key = %delivery.routing_key,
                attempt,
                max_attempts = policy.max_attempts,
                "transient handler failure, requeueing"
            );
            channel.nack(delivery.delivery_tag, true).await?;
        }
        Disposition::DeadLetter => {
            tracing::error!(
                queue = %queue,
                routing_key = %delivery.routing_key,
                attempt,
                outcome = ?outcome,
                "dead-lettering delivery"
            );
            channel.nack(delivery.delivery_tag, false).await?;
            attempts.settle(delivery);
        }
    }
    Ok(())
}
