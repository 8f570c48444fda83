//! # Shopwire Identity
//!
//! The identity service's side of the choreography. It owns user records
//! and reacts to the rest of the platform:
//!
//! - `cart.created` → store the user's cart reference (closing the
//!   user/cart causal chain started by its own `user.created`)
//! - `product_created` → append the product to the creator's list
//! - `product_deleted` → remove the product from the creator's list
//!
//! Outbound, the service emits `user.created` on account creation and
//! `user.deleted` (carrying the credential to revoke) on account
//! deletion, via [`IdentityEvents`].
//!
//! Persistence is a port ([`UserRepository`]); the HTTP surface that
//! triggers the outbound events lives elsewhere entirely.

mod handlers;
mod publisher;
mod records;
mod repository;
pub mod topology;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use handlers::{CartCreatedHandler, ProductCreatedHandler, ProductDeletedHandler};
pub use publisher::IdentityEvents;
pub use records::UserRecord;
pub use repository::{RepositoryError, UserRepository};

use shopwire_core::broker::BrokerChannel;
use shopwire_core::dispatcher::{Dispatcher, RetryPolicy};
use std::sync::Arc;

/// Assemble the identity dispatcher with every handler registered.
///
/// The channel must already carry the declared
/// [`topology`](topology::topology).
#[must_use]
pub fn dispatcher<R>(
    channel: Arc<dyn BrokerChannel>,
    repository: R,
    policy: RetryPolicy,
) -> Dispatcher
where
    R: UserRepository + Clone + 'static,
{
    Dispatcher::new(channel, policy)
        .register(Arc::new(CartCreatedHandler::new(repository.clone())))
        .register(Arc::new(ProductCreatedHandler::new(repository.clone())))
        .register(Arc::new(ProductDeletedHandler::new(repository)))
}
