//! User persistence port.
//!
//! Relational mechanics are out of scope; the choreography only needs
//! these operations, each assumed transactional per single-aggregate
//! write.

use crate::records::UserRecord;
use shopwire_core::handler::HandlerError;
use thiserror::Error;
use uuid::Uuid;

/// Storage-level failure.
///
/// Deliberately coarse: from the dispatcher's point of view every storage
/// fault is transient and worth a bounded retry.
#[derive(Debug, Error, Clone)]
#[error("user storage unavailable: {0}")]
pub struct RepositoryError(pub String);

impl From<RepositoryError> for HandlerError {
    fn from(e: RepositoryError) -> Self {
        Self::Transient(e.to_string())
    }
}

/// Port over the user collection.
pub trait UserRepository: Send + Sync {
    /// Fetch a user by id.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if storage is unreachable.
    fn find_by_id(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<UserRecord>, RepositoryError>> + Send;

    /// Insert or replace a user record.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if storage is unreachable.
    fn upsert(
        &self,
        user: UserRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a user record. Deleting an absent record is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] if storage is unreachable.
    fn delete(
        &self,
        id: Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
