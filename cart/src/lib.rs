//! # Shopwire Cart
//!
//! The cart service's side of the choreography. It reacts to:
//!
//! - `user.created` → create the user's cart, reply with `cart.created`
//! - `user.deleted` → delete the cart and blacklist the credential token
//! - `cart.item_added` → insert or increment a line item
//! - `product_deleted` → sweep the product out of every cart
//!
//! The cart service is the only writer of the revocation cache and the
//! only publisher of `cart.created`; everything else it does is local
//! state. Persistence is a port ([`CartRepository`]); the HTTP surface is
//! not this crate's concern.

mod handlers;
mod records;
mod repository;
pub mod topology;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use handlers::{
    CartItemAddedHandler, ProductDeletedHandler, UserCreatedHandler, UserDeletedHandler,
};
pub use records::{Cart, LineItem};
pub use repository::{CartRepository, RepositoryError};

use shopwire_core::broker::BrokerChannel;
use shopwire_core::clock::Clock;
use shopwire_core::dispatcher::{Dispatcher, RetryPolicy};
use shopwire_core::publisher::EventPublisher;
use shopwire_revocation::{RevocationCache, RevocationConfig};
use std::sync::Arc;

/// Assemble the cart dispatcher with every handler registered.
///
/// The channel must already carry the declared
/// [`topology`](topology::topology); the same channel backs the
/// `cart.created` reply publisher.
#[must_use]
pub fn dispatcher<R, C>(
    channel: Arc<dyn BrokerChannel>,
    repository: R,
    cache: C,
    clock: Arc<dyn Clock>,
    revocation: RevocationConfig,
    policy: RetryPolicy,
) -> Dispatcher
where
    R: CartRepository + Clone + 'static,
    C: RevocationCache + 'static,
{
    let publisher = EventPublisher::new(Arc::clone(&channel));
    Dispatcher::new(channel, policy)
        .register(Arc::new(UserCreatedHandler::new(
            repository.clone(),
            publisher,
            Arc::clone(&clock),
        )))
        .register(Arc::new(UserDeletedHandler::new(
            repository.clone(),
            cache,
            revocation,
        )))
        .register(Arc::new(CartItemAddedHandler::new(
            repository.clone(),
            Arc::clone(&clock),
        )))
        .register(Arc::new(ProductDeletedHandler::new(repository, clock)))
}
