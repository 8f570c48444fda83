//! Domain event wire types.
//!
//! Events are immutable, single-use messages: created by a domain action,
//! transported once through the broker, consumed by the bound queue(s), and
//! never stored after successful acknowledgement.
//!
//! # Wire format
//!
//! Each event is a UTF-8 JSON object with a stable, explicit field set.
//! There is no envelope and no schema registry; compatibility rests on two
//! rules enforced by the default codec here:
//!
//! - unknown extra fields are tolerated (forward compatibility)
//! - a missing required field is a deserialization failure, never a silent
//!   default - the dispatcher dead-letters such payloads
//!
//! # Example
//!
//! ```
//! use shopwire_core::events::{DomainEvent, UserCreated};
//! use uuid::Uuid;
//!
//! let event = UserCreated {
//!     user_id: Uuid::new_v4(),
//!     name: "Ada".to_string(),
//!     email: "ada@example.com".to_string(),
//! };
//! let payload = event.to_payload().expect("encodable");
//! let decoded = UserCreated::from_payload(&payload).expect("decodable");
//! assert_eq!(decoded.email, "ada@example.com");
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use uuid::Uuid;

/// Error types for event encoding and decoding.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize an event to its JSON payload.
    #[error("Failed to encode event: {0}")]
    Encode(String),

    /// Failed to deserialize a payload into an event.
    #[error("Failed to decode event: {0}")]
    Decode(String),
}

/// A choreography event with a fixed publish target.
///
/// The exchange and routing key are part of an event's identity: the
/// publisher needs no further routing input, and consumers derive queue
/// bindings from the same constants (see [`topology`](crate::topology)).
///
/// # Serialization
///
/// The default methods encode to and from UTF-8 JSON via `serde_json`.
/// Implementors only pick the constants.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Exchange this event is published to.
    const EXCHANGE: &'static str;

    /// Routing key this event is published with.
    const ROUTING_KEY: &'static str;

    /// Encode this event to its JSON wire payload.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Encode`] if serialization fails, which for
    /// these plain-data types indicates a bug rather than bad input.
    fn to_payload(&self) -> Result<Vec<u8>, EventError> {
        serde_json::to_vec(self).map_err(|e| EventError::Encode(e.to_string()))
    }

    /// Decode an event from a JSON wire payload.
    ///
    /// Unknown fields are ignored; missing required fields fail.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Decode`] for malformed JSON or a payload
    /// missing required fields.
    fn from_payload(payload: &[u8]) -> Result<Self, EventError> {
        serde_json::from_slice(payload).map_err(|e| EventError::Decode(e.to_string()))
    }
}

/// An account was created. Emitted exactly once per successful creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCreated {
    /// The new account's id.
    pub user_id: Uuid,
    /// Display name.
    pub name: String,
    /// Contact email.
    pub email: String,
}

impl DomainEvent for UserCreated {
    const EXCHANGE: &'static str = crate::topology::USER_EXCHANGE;
    const ROUTING_KEY: &'static str = crate::topology::USER_CREATED_KEY;
}

/// A cart was created for a user. Emitted exactly once per cart creation;
/// the second hop of the user/cart causal chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartCreated {
    /// Owner of the new cart.
    pub user_id: Uuid,
    /// The new cart's id, unique across the system.
    pub cart_id: Uuid,
}

impl DomainEvent for CartCreated {
    const EXCHANGE: &'static str = crate::topology::USER_EXCHANGE;
    const ROUTING_KEY: &'static str = crate::topology::CART_CREATED_KEY;
}

/// A product was created. Emitted exactly once per successful creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    /// The user who created the product.
    pub creator_id: Uuid,
    /// The new product's id.
    pub product_id: Uuid,
}

impl DomainEvent for ProductCreated {
    const EXCHANGE: &'static str = crate::topology::USER_EXCHANGE;
    const ROUTING_KEY: &'static str = crate::topology::PRODUCT_CREATED_KEY;
}

/// A product was placed into a cart.
///
/// May be delivered more than once; the cart-side handler increments an
/// existing line item rather than appending a second one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemAdded {
    /// Target cart.
    pub cart_id: Uuid,
    /// Product added.
    pub product_id: Uuid,
    /// Product name snapshot at add time.
    pub name: String,
    /// Unit price snapshot at add time.
    pub price: Decimal,
}

impl DomainEvent for CartItemAdded {
    const EXCHANGE: &'static str = crate::topology::CART_EXCHANGE;
    const ROUTING_KEY: &'static str = crate::topology::CART_ITEM_ADDED_KEY;
}

/// A product was deleted. Triggers cascading removal of matching line
/// items everywhere and of the id from the creator's product list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDeleted {
    /// The user who created the product.
    pub creator_id: Uuid,
    /// The deleted product's id.
    pub product_id: Uuid,
}

impl DomainEvent for ProductDeleted {
    const EXCHANGE: &'static str = crate::topology::CART_EXCHANGE;
    const ROUTING_KEY: &'static str = crate::topology::PRODUCT_DELETED_KEY;
}

/// An account was deleted.
///
/// Triggers cart deletion and credential revocation. Ownership of the
/// revocation token transfers to the revocation cache: the consuming
/// handler blacklists it for the remainder of its validity window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDeleted {
    /// The deleted user's cart, to be removed.
    pub cart_id: Uuid,
    /// The credential token to blacklist until it expires naturally.
    pub revocation_token: String,
}

impl DomainEvent for UserDeleted {
    const EXCHANGE: &'static str = crate::topology::USER_EXCHANGE;
    const ROUTING_KEY: &'static str = crate::topology::USER_DELETED_KEY;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology;

    #[test]
    #[allow(clippy::expect_used)] // Panics: test fails if the codec fails
    fn payload_roundtrip() {
        let event = CartCreated {
            user_id: Uuid::new_v4(),
            cart_id: Uuid::new_v4(),
        };
        let payload = event.to_payload().expect("encode");
        let decoded = CartCreated::from_payload(&payload).expect("decode");
        assert_eq!(event, decoded);
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: test fails if tolerance is lost
    fn unknown_fields_are_tolerated() {
        let payload = br#"{
            "user_id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
            "cart_id": "16fd2706-8baf-433b-82eb-8c7fada847da",
            "introduced_later": true
        }"#;
        let decoded = CartCreated::from_payload(payload).expect("decode with extra field");
        assert_eq!(
            decoded.cart_id.to_string(),
            "16fd2706-8baf-433b-82eb-8c7fada847da"
        );
    }

    #[test]
    fn missing_required_field_fails() {
        let payload = br#"{"user_id": "7c9e6679-7425-40de-944b-e07fc1f90ae7"}"#;
        let result = CartCreated::from_payload(payload);
        assert!(matches!(result, Err(EventError::Decode(_))));
    }

    #[test]
    fn malformed_json_fails() {
        let result = UserCreated::from_payload(b"not json at all");
        assert!(matches!(result, Err(EventError::Decode(_))));
    }

    #[test]
    fn publish_targets_match_the_topology() {
        assert_eq!(UserCreated::EXCHANGE, topology::USER_EXCHANGE);
        assert_eq!(UserCreated::ROUTING_KEY, "user.created");
        assert_eq!(UserDeleted::ROUTING_KEY, "user.deleted");
        assert_eq!(CartCreated::ROUTING_KEY, "cart.created");
        assert_eq!(ProductCreated::ROUTING_KEY, "product_created");
        assert_eq!(CartItemAdded::EXCHANGE, topology::CART_EXCHANGE);
        assert_eq!(CartItemAdded::ROUTING_KEY, "cart.item_added");
        assert_eq!(ProductDeleted::ROUTING_KEY, "product_deleted");
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: test fails if the codec fails
    fn price_survives_as_decimal() {
        let event = CartItemAdded {
            cart_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            name: "Keyboard".to_string(),
            price: Decimal::new(4999, 2),
        };
        let payload = event.to_payload().expect("encode");
        let decoded = CartItemAdded::from_payload(&payload).expect("decode");
        assert_eq!(decoded.price, Decimal::new(4999, 2));
    }
}
