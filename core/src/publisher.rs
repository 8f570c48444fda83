//! Durable event publishing.
//!
//! One [`EventPublisher`] per service, process-wide, wrapping the service's
//! long-lived broker channel. Publishing is fire-and-forget from the
//! caller's perspective: the call returns once the broker has accepted the
//! frame, not once any consumer has processed it. A connection failure
//! surfaces as a hard error to the caller - nothing is retried or
//! swallowed on the publish side.

use crate::broker::{BrokerChannel, BrokerError, PublishProperties};
use crate::events::DomainEvent;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced to publishing call sites.
#[derive(Error, Debug)]
pub enum PublishError {
    /// The event could not be encoded to its wire payload.
    #[error("Failed to encode '{routing_key}' event: {reason}")]
    Encode {
        /// Routing key of the unencodable event
        routing_key: String,
        /// Underlying serialization failure
        reason: String,
    },

    /// The broker rejected or never accepted the frame.
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Publishes domain events with durable, persistent delivery.
///
/// The underlying channel is not safe for unsynchronized concurrent
/// publishing, so all publish calls are serialized through an internal
/// async mutex. Cloning shares the same channel and the same lock.
///
/// # Example
///
/// ```no_run
/// use shopwire_core::events::ProductDeleted;
/// use shopwire_core::publisher::EventPublisher;
/// # use shopwire_core::broker::BrokerChannel;
/// # use std::sync::Arc;
///
/// # async fn example(channel: Arc<dyn BrokerChannel>) -> Result<(), Box<dyn std::error::Error>> {
/// let publisher = EventPublisher::new(channel);
/// publisher
///     .publish(&ProductDeleted {
///         creator_id: uuid::Uuid::new_v4(),
///         product_id: uuid::Uuid::new_v4(),
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EventPublisher {
    channel: Arc<dyn BrokerChannel>,
    publish_lock: Arc<tokio::sync::Mutex<()>>,
}

impl EventPublisher {
    /// Create a publisher over an already-declared topology.
    ///
    /// The exchange an event targets must have been declared (see
    /// [`Topology::declare`](crate::topology::Topology::declare)) before
    /// the first publish.
    #[must_use]
    pub fn new(channel: Arc<dyn BrokerChannel>) -> Self {
        Self {
            channel,
            publish_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Publish one event to its exchange with its routing key.
    ///
    /// The message is marked persistent and stamped with a fresh message
    /// id; the id is what the consuming dispatcher's bounded-retry policy
    /// keys on.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Encode`] if the event cannot be serialized,
    /// or [`PublishError::Broker`] if the broker does not accept the frame.
    pub async fn publish<E: DomainEvent>(&self, event: &E) -> Result<(), PublishError> {
        let payload = event.to_payload().map_err(|e| PublishError::Encode {
            routing_key: E::ROUTING_KEY.to_string(),
            reason: e.to_string(),
        })?;
        let message_id = Uuid::new_v4().to_string();
        let properties = PublishProperties::persistent_json(message_id.clone());

        let _serialized = self.publish_lock.lock().await;
        self.channel
            .publish(E::EXCHANGE, E::ROUTING_KEY, properties, &payload)
            .await?;

        tracing::debug!(
            exchange = E::EXCHANGE,
            routing_key = E::ROUTING_KEY,
            message_id = %message_id,
            bytes = payload.len(),
            "event published"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_publisher_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<EventPublisher>();
        assert_sync::<EventPublisher>();
    }
}
