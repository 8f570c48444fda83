//! Broker channel abstraction for cross-service event delivery.
//!
//! This module provides the [`BrokerChannel`] trait, the seam between the
//! choreography core and a concrete message broker. Events flow from a
//! service's domain action through the [`EventPublisher`](crate::publisher::EventPublisher)
//! into a durable topic exchange, and back out of bound queues into the
//! [`Dispatcher`](crate::dispatcher::Dispatcher).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  Domain action   │
//! └────────┬─────────┘
//!          │ publish(exchange, routing key)
//!          ▼
//! ┌──────────────────┐
//! │  Topic exchange  │◄─── durable, declared up front
//! └────────┬─────────┘
//!          │ binding match
//!          ▼
//! ┌──────────────────┐
//! │   Bound queue    │◄─── manual acknowledgement
//! └────────┬─────────┘
//!          │ Delivery
//!          ▼
//! ┌──────────────────┐      nack(requeue=false)
//! │  Event handler   │─────────────────────────────► dead-letter exchange
//! └──────────────────┘
//! ```
//!
//! # Delivery Semantics
//!
//! **At-least-once delivery** with manual acknowledgement:
//! - A delivery is acked only after its handler completed successfully
//! - A crash before ack leaves the message unacked; the broker redelivers it
//! - Handlers MUST be idempotent (duplicate delivery is normal operation)
//! - Ordering holds per queue and per publisher only; nothing is guaranteed
//!   across routing keys
//!
//! # Implementations
//!
//! - `InMemoryBroker` (shopwire-testing) - full port semantics in-process
//! - `AmqpBroker` (shopwire-amqp) - production AMQP 0.9.1 over lapin
//!
//! # Dyn Compatibility
//!
//! The trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` so it can be used as a trait object (`Arc<dyn BrokerChannel>`)
//! shared between the publisher and the dispatcher.

use crate::topology::{Binding, ExchangeSpec, QueueSpec};
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during broker operations.
#[derive(Error, Debug, Clone)]
pub enum BrokerError {
    /// Failed to connect to the broker or open a channel.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to declare an exchange or queue.
    #[error("Declaration of {object} failed: {reason}")]
    DeclareFailed {
        /// The exchange or queue that failed to declare
        object: String,
        /// The reason for failure
        reason: String,
    },

    /// An exchange or queue was redeclared with conflicting parameters.
    ///
    /// Topology declarations are convergent: redeclaring with identical
    /// parameters is a no-op, while a mismatch (kind, durability,
    /// dead-letter arguments) is a configuration error that must stop the
    /// service before it accepts traffic.
    #[error("Conflicting redeclaration of {object}: {reason}")]
    PreconditionFailed {
        /// The exchange or queue with conflicting parameters
        object: String,
        /// What differed from the existing declaration
        reason: String,
    },

    /// Failed to publish to an exchange.
    #[error("Publish failed for exchange '{exchange}' routing key '{routing_key}': {reason}")]
    PublishFailed {
        /// The target exchange
        exchange: String,
        /// The routing key used
        routing_key: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to start consuming from a queue.
    #[error("Consume failed for queue '{queue}': {reason}")]
    ConsumeFailed {
        /// The queue that failed
        queue: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to acknowledge or reject a delivery.
    #[error("Acknowledgement failed for delivery tag {delivery_tag}: {reason}")]
    AckFailed {
        /// The delivery tag being settled
        delivery_tag: u64,
        /// The reason for failure
        reason: String,
    },

    /// Published to an exchange that has not been declared.
    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    /// Consumed from a queue that has not been declared.
    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    /// Network or transport error on an established connection.
    ///
    /// Fatal to the affected component: the process should fail fast and
    /// rely on external supervision rather than silently reconnecting with
    /// possibly stale topology.
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// Result alias for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Boxed future used by dyn-compatible broker traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Stream of deliveries from a queue subscription.
///
/// Each item is either a [`Delivery`] awaiting acknowledgement or a
/// transport-level error. The stream ends when the channel closes.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery, BrokerError>> + Send>>;

/// A single message handed to a consumer, awaiting acknowledgement.
#[derive(Clone, Debug)]
pub struct Delivery {
    /// Channel-scoped tag identifying this delivery for ack/nack.
    pub delivery_tag: u64,

    /// The exchange the message was published to.
    pub exchange: String,

    /// The routing key the message was published with.
    pub routing_key: String,

    /// Raw message payload (UTF-8 JSON for shopwire events).
    pub payload: Vec<u8>,

    /// Publisher-stamped message id, if any.
    ///
    /// Shopwire publishers always stamp one; foreign publishers may not.
    /// The dispatcher's bounded-retry policy keys on this.
    pub message_id: Option<String>,

    /// Whether the broker has delivered this message before.
    pub redelivered: bool,
}

/// Properties attached to a published message.
#[derive(Clone, Debug, Default)]
pub struct PublishProperties {
    /// Message id to stamp on the message, if any.
    pub message_id: Option<String>,

    /// Persistent delivery: the broker must log the message to disk before
    /// considering the publish accepted (where the broker supports it).
    pub persistent: bool,

    /// MIME content type of the payload.
    pub content_type: Option<String>,
}

impl PublishProperties {
    /// Properties for a durable JSON event with the given message id.
    #[must_use]
    pub fn persistent_json(message_id: String) -> Self {
        Self {
            message_id: Some(message_id),
            persistent: true,
            content_type: Some("application/json".to_string()),
        }
    }
}

/// A single broker channel: declarations, publishing and consuming.
///
/// One channel per service is the normal arrangement. The channel is NOT
/// safe for unsynchronized concurrent publishing; [`EventPublisher`]
/// serializes publish calls, and the [`Dispatcher`] owns the consume side.
/// Multiple queue subscriptions may share one channel - delivery tags are
/// channel-scoped, so acknowledgements from sibling subscriptions do not
/// interfere.
///
/// # Lifecycle
///
/// Channels are created explicitly by the application, injected into the
/// publisher and dispatcher at construction, and released on shutdown.
/// There is no ambient singleton.
///
/// [`EventPublisher`]: crate::publisher::EventPublisher
/// [`Dispatcher`]: crate::dispatcher::Dispatcher
pub trait BrokerChannel: Send + Sync {
    /// Declare an exchange.
    ///
    /// Idempotent and convergent: declaring an exchange that already exists
    /// with identical parameters is a no-op. Redeclaring with conflicting
    /// parameters fails with [`BrokerError::PreconditionFailed`].
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::DeclareFailed`] or
    /// [`BrokerError::PreconditionFailed`].
    fn declare_exchange<'a>(&'a self, spec: &'a ExchangeSpec) -> BoxFuture<'a, BrokerResult<()>>;

    /// Declare a queue, including its dead-letter wiring.
    ///
    /// Same convergence rules as [`declare_exchange`](Self::declare_exchange).
    /// A queue's dead-letter exchange and routing key are declaration
    /// parameters: a message rejected without requeue is forwarded there by
    /// the broker itself.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::DeclareFailed`] or
    /// [`BrokerError::PreconditionFailed`].
    fn declare_queue<'a>(&'a self, spec: &'a QueueSpec) -> BoxFuture<'a, BrokerResult<()>>;

    /// Bind a queue to an exchange with a routing-key pattern.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::UnknownExchange`] or [`BrokerError::UnknownQueue`]
    /// if either end of the binding has not been declared.
    fn bind_queue<'a>(&'a self, binding: &'a Binding) -> BoxFuture<'a, BrokerResult<()>>;

    /// Publish a message to an exchange.
    ///
    /// Returns once the broker has accepted the frame - not once any
    /// consumer has processed it. Connection failures surface as hard
    /// errors; nothing is retried or swallowed here.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::PublishFailed`] or
    /// [`BrokerError::UnknownExchange`].
    fn publish<'a>(
        &'a self,
        exchange: &'a str,
        routing_key: &'a str,
        properties: PublishProperties,
        payload: &'a [u8],
    ) -> BoxFuture<'a, BrokerResult<()>>;

    /// Subscribe to a queue with manual acknowledgement.
    ///
    /// Every yielded [`Delivery`] must be settled with [`ack`](Self::ack) or
    /// [`nack`](Self::nack); unsettled deliveries are redelivered after the
    /// channel closes.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::ConsumeFailed`] or [`BrokerError::UnknownQueue`].
    fn consume<'a>(
        &'a self,
        queue: &'a str,
        consumer_tag: &'a str,
    ) -> BoxFuture<'a, BrokerResult<DeliveryStream>>;

    /// Acknowledge a single delivery (never cumulative).
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::AckFailed`] if the tag is unknown or the
    /// channel is gone.
    fn ack(&self, delivery_tag: u64) -> BoxFuture<'_, BrokerResult<()>>;

    /// Negatively acknowledge a single delivery.
    ///
    /// With `requeue` the message returns to the front of its queue for
    /// immediate redelivery (no backoff). Without `requeue` the message is
    /// forwarded to the queue's dead-letter exchange, or dropped if the
    /// queue has none.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::AckFailed`] if the tag is unknown or the
    /// channel is gone.
    fn nack(&self, delivery_tag: u64, requeue: bool) -> BoxFuture<'_, BrokerResult<()>>;
}
