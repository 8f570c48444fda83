//! Event handler contract and the error model the dispatcher interprets.
//!
//! A handler is a state-transition function over local storage plus at most
//! one outbound publish. Because delivery is at-least-once, every handler
//! must be safe to apply twice: "create if absent" rather than "create",
//! "increment existing line item" rather than "always append".
//!
//! Handlers do not decide acknowledgement. They classify failures with
//! [`HandlerError`] and the [`Dispatcher`](crate::dispatcher::Dispatcher)
//! maps the tag to ack / bounded requeue / dead-letter uniformly - there is
//! no branching on concrete error types anywhere in the delivery path.

use crate::broker::{BoxFuture, Delivery};
use crate::events::DomainEvent;
use crate::publisher::PublishError;
use thiserror::Error;

/// How a handler failed, from the dispatcher's point of view.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// A retryable fault: storage hiccup, downstream publish failure.
    ///
    /// The dispatcher requeues for immediate redelivery until the bounded
    /// retry policy trips, then dead-letters.
    #[error("transient failure: {0}")]
    Transient(String),

    /// A fault retrying cannot fix: malformed payload, broken invariant.
    ///
    /// The dispatcher dead-letters immediately; the message never returns
    /// to its queue.
    #[error("permanent failure: {0}")]
    Permanent(String),

    /// The entity this event refers to no longer exists.
    ///
    /// Logged and dropped (acked): retrying cannot resurrect a deleted
    /// user or cart, so this is eventual-consistency noise, not an error
    /// worth redelivering.
    #[error("entity not found: {0}")]
    NotFound(String),
}

impl From<PublishError> for HandlerError {
    /// A failed chained publish is retryable: the handler's local write is
    /// idempotent, so redelivering the inbound event and trying again is
    /// safe.
    fn from(e: PublishError) -> Self {
        Self::Transient(e.to_string())
    }
}

/// Result alias for handler bodies.
pub type HandlerResult = Result<(), HandlerError>;

/// A consumer of one event type from one queue.
///
/// The dispatcher runs each registered handler on its own subscription
/// task; a failing handler never blocks delivery to a sibling.
pub trait EventHandler: Send + Sync {
    /// The queue this handler consumes from.
    fn queue(&self) -> &str;

    /// Apply one delivery.
    ///
    /// Implementations decode their own event type (see [`decode`]) so a
    /// payload that cannot be decoded is classified by the handler itself,
    /// not by transport plumbing.
    fn handle<'a>(&'a self, delivery: &'a Delivery) -> BoxFuture<'a, HandlerResult>;
}

/// Decode a delivery payload into a typed event.
///
/// Maps decode failures to [`HandlerError::Permanent`]: a payload that does
/// not parse today will not parse on redelivery either, so it goes straight
/// to the dead letter queue.
///
/// # Errors
///
/// Returns [`HandlerError::Permanent`] for malformed JSON or a payload
/// missing required fields.
pub fn decode<E: DomainEvent>(delivery: &Delivery) -> Result<E, HandlerError> {
    E::from_payload(&delivery.payload).map_err(|e| {
        HandlerError::Permanent(format!(
            "undecodable '{}' payload: {e}",
            E::ROUTING_KEY
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CartCreated;
    use uuid::Uuid;

    fn delivery_with(payload: &[u8]) -> Delivery {
        Delivery {
            delivery_tag: 1,
            exchange: "user.exchange".to_string(),
            routing_key: "cart.created".to_string(),
            payload: payload.to_vec(),
            message_id: Some(Uuid::new_v4().to_string()),
            redelivered: false,
        }
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: test fails if decoding fails
    fn decode_accepts_valid_payload() {
        let event = CartCreated {
            user_id: Uuid::new_v4(),
            cart_id: Uuid::new_v4(),
        };
        let payload = serde_json::to_vec(&event).expect("encode");
        let decoded: CartCreated = decode(&delivery_with(&payload)).expect("decode");
        assert_eq!(decoded, event);
    }

    #[test]
    fn decode_classifies_garbage_as_permanent() {
        let result: Result<CartCreated, _> = decode(&delivery_with(b"{{{"));
        assert!(matches!(result, Err(HandlerError::Permanent(_))));
    }
}
