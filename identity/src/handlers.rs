//! Identity-side event handlers.
//!
//! Each handler is an idempotent state transition over the user
//! repository. None of them publishes follow-up events; the identity
//! service is the end of every chain it participates in.

use crate::repository::UserRepository;
use crate::topology::{CART_CREATED_QUEUE, PRODUCT_CREATED_QUEUE, PRODUCT_DELETED_QUEUE};
use shopwire_core::broker::{BoxFuture, Delivery};
use shopwire_core::events::{CartCreated, ProductCreated, ProductDeleted};
use shopwire_core::handler::{EventHandler, HandlerError, HandlerResult, decode};

/// Sets the user's cart reference when the cart service reports back.
///
/// The third hop of the user/cart causal chain. If the user was deleted
/// in the meantime the transition is a logged skip: retrying cannot
/// resurrect a deleted user.
pub struct CartCreatedHandler<R> {
    repository: R,
}

impl<R> CartCreatedHandler<R> {
    /// Create the handler over the user repository.
    pub const fn new(repository: R) -> Self {
        Self { repository }
    }
}

impl<R: UserRepository> EventHandler for CartCreatedHandler<R> {
    fn queue(&self) -> &str {
        CART_CREATED_QUEUE
    }

    fn handle<'a>(&'a self, delivery: &'a Delivery) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let event: CartCreated = decode(delivery)?;
            let mut user = self
                .repository
                .find_by_id(event.user_id)
                .await?
                .ok_or_else(|| {
                    HandlerError::NotFound(format!("user {} no longer exists", event.user_id))
                })?;

            user.cart_id = Some(event.cart_id);
            self.repository.upsert(user).await?;

            tracing::info!(
                user_id = %event.user_id,
                cart_id = %event.cart_id,
                "cart reference stored"
            );
            Ok(())
        })
    }
}

/// Appends a created product to its creator's list.
pub struct ProductCreatedHandler<R> {
    repository: R,
}

impl<R> ProductCreatedHandler<R> {
    /// Create the handler over the user repository.
    pub const fn new(repository: R) -> Self {
        Self { repository }
    }
}

impl<R: UserRepository> EventHandler for ProductCreatedHandler<R> {
    fn queue(&self) -> &str {
        PRODUCT_CREATED_QUEUE
    }

    fn handle<'a>(&'a self, delivery: &'a Delivery) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let event: ProductCreated = decode(delivery)?;
            let mut user = self
                .repository
                .find_by_id(event.creator_id)
                .await?
                .ok_or_else(|| {
                    HandlerError::NotFound(format!("creator {} no longer exists", event.creator_id))
                })?;

            // Append-if-absent keeps duplicate delivery harmless.
            if !user.created_product_ids.contains(&event.product_id) {
                user.created_product_ids.push(event.product_id);
                self.repository.upsert(user).await?;
            }

            tracing::info!(
                creator_id = %event.creator_id,
                product_id = %event.product_id,
                "product recorded for creator"
            );
            Ok(())
        })
    }
}

/// Removes a deleted product from its creator's list.
///
/// Defined as a set difference: already-absent is success, so duplicate
/// delivery is a no-op rather than an error.
pub struct ProductDeletedHandler<R> {
    repository: R,
}

impl<R> ProductDeletedHandler<R> {
    /// Create the handler over the user repository.
    pub const fn new(repository: R) -> Self {
        Self { repository }
    }
}

impl<R: UserRepository> EventHandler for ProductDeletedHandler<R> {
    fn queue(&self) -> &str {
        PRODUCT_DELETED_QUEUE
    }

    fn handle<'a>(&'a self, delivery: &'a Delivery) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let event: ProductDeleted = decode(delivery)?;
            let Some(mut user) = self.repository.find_by_id(event.creator_id).await? else {
                return Err(HandlerError::NotFound(format!(
                    "creator {} no longer exists",
                    event.creator_id
                )));
            };

            let before = user.created_product_ids.len();
            user.created_product_ids.retain(|id| *id != event.product_id);
            if user.created_product_ids.len() != before {
                self.repository.upsert(user).await?;
                tracing::info!(
                    creator_id = %event.creator_id,
                    product_id = %event.product_id,
                    "product removed from creator"
                );
            }
            Ok(())
        })
    }
}
