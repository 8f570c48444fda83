//! Broker topology: exchanges, queues, bindings and dead-letter routes.
//!
//! Every service declares the full topology it touches at startup, before
//! its publisher or dispatcher accepts any traffic. Declarations are
//! convergent - several services redeclaring `user.exchange` with identical
//! parameters is normal and harmless, while a parameter mismatch is a fatal
//! configuration error surfaced by the broker.
//!
//! Ordering is fixed: exchanges, then queues, then bindings, then
//! consumption starts.
//!
//! # Naming
//!
//! Consuming queues are named `{service}_{event}_queue` (the cart item
//! queue keeps its historical `cart_item_added_queue` name). Every
//! consuming queue dead-letters to [`DEAD_LETTER_EXCHANGE`] with routing
//! key `{original-key}.dlx`, and each service binds [`DEAD_LETTER_QUEUE`]
//! once per `.dlx` key it can emit.

use crate::broker::{BrokerChannel, BrokerResult};

/// Exchange carrying identity-originated traffic (and the cart-created
/// reply leg of the user/cart chain).
pub const USER_EXCHANGE: &str = "user.exchange";

/// Exchange carrying cart-affecting catalog traffic.
pub const CART_EXCHANGE: &str = "cart.exchange";

/// Exchange receiving rejected and poison messages.
pub const DEAD_LETTER_EXCHANGE: &str = "dead_letter_exchange";

/// Queue collecting everything routed through the dead-letter exchange.
pub const DEAD_LETTER_QUEUE: &str = "dead_letter_queue";

/// Routing key for [`UserCreated`](crate::events::UserCreated).
pub const USER_CREATED_KEY: &str = "user.created";

/// Routing key for [`UserDeleted`](crate::events::UserDeleted).
pub const USER_DELETED_KEY: &str = "user.deleted";

/// Routing key for [`CartCreated`](crate::events::CartCreated).
pub const CART_CREATED_KEY: &str = "cart.created";

/// Routing key for [`ProductCreated`](crate::events::ProductCreated).
///
/// The underscore (vs. the dotted keys above) is the shape this key has
/// always had on the wire; changing it would strand existing bindings.
pub const PRODUCT_CREATED_KEY: &str = "product_created";

/// Routing key for [`ProductDeleted`](crate::events::ProductDeleted).
pub const PRODUCT_DELETED_KEY: &str = "product_deleted";

/// Routing key for [`CartItemAdded`](crate::events::CartItemAdded).
pub const CART_ITEM_ADDED_KEY: &str = "cart.item_added";

/// Dead-letter routing key for a given original routing key.
#[must_use]
pub fn dead_letter_key(routing_key: &str) -> String {
    format!("{routing_key}.dlx")
}

/// Exchange kinds supported by the port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeKind {
    /// Routing-key pattern matching (`*` one word, `#` zero or more).
    Topic,
    /// Exact routing-key match.
    Direct,
    /// Routing key ignored; every bound queue receives a copy.
    Fanout,
}

/// Declaration parameters for an exchange.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeSpec {
    /// Exchange name.
    pub name: String,
    /// Exchange kind.
    pub kind: ExchangeKind,
    /// Survives broker restarts.
    pub durable: bool,
}

impl ExchangeSpec {
    /// A durable topic exchange - the only kind this system publishes to.
    #[must_use]
    pub fn topic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ExchangeKind::Topic,
            durable: true,
        }
    }
}

/// Dead-letter wiring for a queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeadLetter {
    /// Exchange rejected messages are forwarded to.
    pub exchange: String,
    /// Routing key used on the forward.
    pub routing_key: String,
}

/// Declaration parameters for a queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueSpec {
    /// Queue name.
    pub name: String,
    /// Survives broker restarts.
    pub durable: bool,
    /// Where rejected (requeue=false) messages go, if anywhere.
    pub dead_letter: Option<DeadLetter>,
}

impl QueueSpec {
    /// A durable queue with no dead-letter wiring.
    #[must_use]
    pub fn durable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            durable: true,
            dead_letter: None,
        }
    }

    /// Attach dead-letter wiring.
    #[must_use]
    pub fn with_dead_letter(
        mut self,
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        self.dead_letter = Some(DeadLetter {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
        });
        self
    }
}

/// A queue-to-exchange binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    /// Queue receiving matched messages.
    pub queue: String,
    /// Source exchange.
    pub exchange: String,
    /// Routing-key pattern matched against published keys.
    pub routing_key: String,
}

/// The set of declarations a service applies at startup.
///
/// Built with the fluent methods below and applied with [`declare`]
/// in the required order (exchanges, queues, bindings).
///
/// # Example
///
/// ```
/// use shopwire_core::topology::{ExchangeSpec, Topology, USER_EXCHANGE, USER_CREATED_KEY};
///
/// let topology = Topology::new()
///     .exchange(ExchangeSpec::topic(USER_EXCHANGE))
///     .consuming_queue("cart_user_created_queue", USER_EXCHANGE, USER_CREATED_KEY);
/// ```
///
/// [`declare`]: Topology::declare
#[derive(Clone, Debug, Default)]
pub struct Topology {
    exchanges: Vec<ExchangeSpec>,
    queues: Vec<QueueSpec>,
    bindings: Vec<Binding>,
}

impl Topology {
    /// An empty topology.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an exchange declaration.
    #[must_use]
    pub fn exchange(mut self, spec: ExchangeSpec) -> Self {
        self.exchanges.push(spec);
        self
    }

    /// Add a queue declaration.
    #[must_use]
    pub fn queue(mut self, spec: QueueSpec) -> Self {
        self.queues.push(spec);
        self
    }

    /// Add a binding.
    #[must_use]
    pub fn bind(
        mut self,
        queue: impl Into<String>,
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        self.bindings.push(Binding {
            queue: queue.into(),
            exchange: exchange.into(),
            routing_key: routing_key.into(),
        });
        self
    }

    /// Declare a consuming queue with its full dead-letter wiring.
    ///
    /// Adds three things at once: the durable queue dead-lettering to
    /// [`DEAD_LETTER_EXCHANGE`] with `{routing_key}.dlx`, the binding of
    /// the queue to its source exchange, and the [`DEAD_LETTER_QUEUE`]
    /// binding for the `.dlx` key. The dead-letter exchange and queue
    /// themselves must be added separately (see [`with_dead_lettering`]).
    ///
    /// [`with_dead_lettering`]: Topology::with_dead_lettering
    #[must_use]
    pub fn consuming_queue(
        self,
        queue: impl Into<String>,
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        let queue = queue.into();
        let exchange = exchange.into();
        let routing_key = routing_key.into();
        let dlx_key = dead_letter_key(&routing_key);

        self.queue(
            QueueSpec::durable(queue.clone()).with_dead_letter(DEAD_LETTER_EXCHANGE, dlx_key.clone()),
        )
        .bind(queue, exchange, routing_key)
        .bind(DEAD_LETTER_QUEUE, DEAD_LETTER_EXCHANGE, dlx_key)
    }

    /// Add the dead-letter exchange and its collection queue.
    #[must_use]
    pub fn with_dead_lettering(self) -> Self {
        self.exchange(ExchangeSpec::topic(DEAD_LETTER_EXCHANGE))
            .queue(QueueSpec::durable(DEAD_LETTER_QUEUE))
    }

    /// Queues declared by this topology.
    #[must_use]
    pub fn queues(&self) -> &[QueueSpec] {
        &self.queues
    }

    /// Bindings declared by this topology.
    #[must_use]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Apply all declarations to a channel in the required order.
    ///
    /// Exchanges first, then queues, then bindings. Must complete before
    /// the publisher or dispatcher for this topology starts.
    ///
    /// # Errors
    ///
    /// Propagates the first broker error; a
    /// [`PreconditionFailed`](crate::broker::BrokerError::PreconditionFailed)
    /// here means two services disagree about a declaration and the service
    /// must not come up.
    pub async fn declare(&self, channel: &dyn BrokerChannel) -> BrokerResult<()> {
        for exchange in &self.exchanges {
            channel.declare_exchange(exchange).await?;
            tracing::debug!(exchange = %exchange.name, "exchange declared");
        }
        for queue in &self.queues {
            channel.declare_queue(queue).await?;
            tracing::debug!(queue = %queue.name, "queue declared");
        }
        for binding in &self.bindings {
            channel.bind_queue(binding).await?;
            tracing::debug!(
                queue = %binding.queue,
                exchange = %binding.exchange,
                routing_key = %binding.routing_key,
                "queue bound"
            );
        }
        tracing::info!(
            exchanges = self.exchanges.len(),
            queues = self.queues.len(),
            bindings = self.bindings.len(),
            "topology declared"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_letter_key_appends_suffix() {
        assert_eq!(dead_letter_key(CART_ITEM_ADDED_KEY), "cart.item_added.dlx");
        assert_eq!(dead_letter_key(PRODUCT_DELETED_KEY), "product_deleted.dlx");
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: test fails if the wiring is absent
    fn consuming_queue_wires_dead_lettering() {
        let topology = Topology::new()
            .with_dead_lettering()
            .exchange(ExchangeSpec::topic(CART_EXCHANGE))
            .consuming_queue("cart_item_added_queue", CART_EXCHANGE, CART_ITEM_ADDED_KEY);

        let queue = topology
            .queues()
            .iter()
            .find(|q| q.name == "cart_item_added_queue")
            .expect("queue present");
        let dead_letter = queue.dead_letter.as_ref().expect("dead letter configured");
        assert_eq!(dead_letter.exchange, DEAD_LETTER_EXCHANGE);
        assert_eq!(dead_letter.routing_key, "cart.item_added.dlx");

        assert!(topology.bindings().contains(&Binding {
            queue: "cart_item_added_queue".to_string(),
            exchange: CART_EXCHANGE.to_string(),
            routing_key: CART_ITEM_ADDED_KEY.to_string(),
        }));
        assert!(topology.bindings().contains(&Binding {
            queue: DEAD_LETTER_QUEUE.to_string(),
            exchange: DEAD_LETTER_EXCHANGE.to_string(),
            routing_key: "cart.item_added.dlx".to_string(),
        }));
    }

    #[test]
    fn exchange_spec_topic_is_durable() {
        let spec = ExchangeSpec::topic(USER_EXCHANGE);
        assert_eq!(spec.kind, ExchangeKind::Topic);
        assert!(spec.durable);
    }
}
