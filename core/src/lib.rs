//! # Shopwire Core
//!
//! Broker-facing core of the shopwire choreography: the channel port, the
//! topology manager, the publisher, the consumer dispatcher and the domain
//! event wire types shared by every service.
//!
//! ## Core Concepts
//!
//! - **Choreography**: services coordinate by reacting to each other's
//!   events; there is no central orchestrator and no shared database
//! - **At-least-once delivery**: duplicate delivery is normal; every
//!   handler is an idempotent state transition
//! - **Manual acknowledgement**: a delivery is settled exactly once -
//!   acked, requeued (bounded), or dead-lettered
//! - **Convergent topology**: every service declares the exchanges, queues
//!   and bindings it touches; identical redeclaration is a no-op,
//!   conflicting redeclaration is fatal
//!
//! ## Crate Layout
//!
//! - [`broker`] - the [`BrokerChannel`](broker::BrokerChannel) port and
//!   delivery types
//! - [`topology`] - exchange/queue/binding declarations and naming
//! - [`events`] - the six wire event types and their JSON codec
//! - [`publisher`] - durable, serialized publishing
//! - [`dispatcher`] - subscriptions, ack/nack semantics, bounded retry
//! - [`handler`] - the handler contract and the
//!   `{Transient, Permanent, NotFound}` error model
//! - [`clock`] - injectable time

pub mod broker;
pub mod clock;
pub mod dispatcher;
pub mod events;
pub mod handler;
pub mod publisher;
pub mod topology;

pub use broker::{BrokerChannel, BrokerError, Delivery, DeliveryStream};
pub use dispatcher::{Dispatcher, DispatcherHandle, RetryPolicy};
pub use events::DomainEvent;
pub use handler::{EventHandler, HandlerError, HandlerResult};
pub use publisher::EventPublisher;
pub use topology::Topology;
