//! Cart persistence port.
//!
//! Relational mechanics are out of scope. Beyond the single-aggregate
//! operations, [`list`](CartRepository::list) is the one query the
//! `product_deleted` cascade needs: it must sweep line items out of every
//! cart, whoever owns it.

use crate::records::Cart;
use shopwire_core::handler::HandlerError;
use thiserror::Error;
use uuid::Uuid;

/// Storage-level failure; transient from the dispatcher's point of view.
#[derive(Debug, Error, Clone)]
#[error("cart storage unavailable: {0}")]
pub struct RepositoryError(pub String);

impl From<RepositoryError> for HandlerError {
    fn from(e: RepositoryError) -> Self {
        Self::Transient(e.to_string())
    }
}

/// Port over the cart collection.
pub trait CartRepository: Send + Sync {
    /// Fetch a cart by id.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if storage is unreachable.
    fn find_by_id(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Cart>, RepositoryError>> + Send;

    /// Fetch a user's cart.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if storage is unreachable.
    fn find_by_user(
        &self,
        user_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Cart>, RepositoryError>> + Send;

    /// Insert or replace a cart record (transactional per aggregate).
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if storage is unreachable.
    fn upsert(
        &self,
        cart: Cart,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a cart. Deleting an absent cart is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if storage is unreachable.
    fn delete(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Every cart, for cross-cart cascades.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if storage is unreachable.
    fn list(&self)
    -> impl std::future::Future<Output = Result<Vec<Cart>, RepositoryError>> + Send;
}
