//! Outbound identity events.
//!
//! Thin typed facade the (out-of-scope) HTTP layer calls after its own
//! storage writes commit. Each method publishes exactly one event.

use shopwire_core::events::{UserCreated, UserDeleted};
use shopwire_core::publisher::{EventPublisher, PublishError};
use uuid::Uuid;

/// Publishes the identity service's domain events.
#[derive(Clone)]
pub struct IdentityEvents {
    publisher: EventPublisher,
}

impl IdentityEvents {
    /// Wrap the service's publisher.
    #[must_use]
    pub const fn new(publisher: EventPublisher) -> Self {
        Self { publisher }
    }

    /// Announce a successful account creation.
    ///
    /// Emitted exactly once per creation; the cart service reacts by
    /// creating the user's cart.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if the broker does not accept the frame.
    pub async fn user_created(
        &self,
        user_id: Uuid,
        name: String,
        email: String,
    ) -> Result<(), PublishError> {
        self.publisher
            .publish(&UserCreated {
                user_id,
                name,
                email,
            })
            .await
    }

    /// Announce an account deletion.
    ///
    /// Carries the credential token whose ownership transfers to the
    /// revocation cache: the consuming handler blacklists it and deletes
    /// the cart.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if the broker does not accept the frame.
    pub async fn user_deleted(
        &self,
        cart_id: Uuid,
        revocation_token: String,
    ) -> Result<(), PublishError> {
        self.publisher
            .publish(&UserDeleted {
                cart_id,
                revocation_token,
            })
            .await
    }
}
