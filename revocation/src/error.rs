//! Error types for revocation operations.

use thiserror::Error;

/// Result type alias for revocation operations.
pub type Result<T> = std::result::Result<T, RevocationError>;

/// Failure modes of the revocation cache and gate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RevocationError {
    /// The presented token is blacklisted.
    ///
    /// Rejected regardless of the token's own cryptographic validity.
    #[error("Token has been revoked")]
    TokenRevoked,

    /// No usable bearer token in the presented credentials.
    #[error("Missing or malformed credentials")]
    MissingCredentials,

    /// The cache backend failed.
    #[error("Revocation cache error: {0}")]
    Cache(String),
}
