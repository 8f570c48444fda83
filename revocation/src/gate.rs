//! Request-path revocation check.
//!
//! The consumer of the blacklist: before honoring any authenticated
//! request, the presented token is looked up here. A hit rejects the
//! request regardless of the token's own cryptographic validity. The
//! surrounding HTTP stack is not this crate's concern - the gate takes a
//! token (or a raw `Authorization` header value) and answers yes or no.

use crate::cache::RevocationCache;
use crate::error::{Result, RevocationError};

/// Extract the bearer token from an `Authorization` header value.
///
/// # Errors
///
/// Returns [`RevocationError::MissingCredentials`] if the value does not
/// carry a non-empty `Bearer` token.
pub fn extract_bearer(header: &str) -> Result<&str> {
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(RevocationError::MissingCredentials)?
        .trim();
    if token.is_empty() {
        return Err(RevocationError::MissingCredentials);
    }
    Ok(token)
}

/// Gate checking presented credentials against the revocation cache.
#[derive(Debug, Clone)]
pub struct RevocationGate<C> {
    cache: C,
}

impl<C: RevocationCache> RevocationGate<C> {
    /// Create a gate over a cache.
    #[must_use]
    pub const fn new(cache: C) -> Self {
        Self { cache }
    }

    /// Reject the token if it has been revoked.
    ///
    /// # Errors
    ///
    /// Returns [`RevocationError::TokenRevoked`] for blacklisted tokens,
    /// or a cache error if the backend cannot be reached (callers decide
    /// whether to fail open or closed; shopwire services fail closed).
    pub async fn authorize(&self, token: &str) -> Result<()> {
        if self.cache.is_revoked(token).await? {
            tracing::warn!("rejected request with revoked token");
            return Err(RevocationError::TokenRevoked);
        }
        Ok(())
    }

    /// [`authorize`](Self::authorize) for a raw `Authorization` header.
    ///
    /// # Errors
    ///
    /// Additionally returns [`RevocationError::MissingCredentials`] when
    /// the header carries no bearer token.
    pub async fn authorize_header(&self, header: &str) -> Result<()> {
        let token = extract_bearer(header)?;
        self.authorize(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRevocationCache;
    use chrono::Duration;

    #[test]
    fn bearer_extraction() {
        assert_eq!(extract_bearer("Bearer abc.def").unwrap(), "abc.def");
        assert_eq!(
            extract_bearer("Basic abc"),
            Err(RevocationError::MissingCredentials)
        );
        assert_eq!(
            extract_bearer("Bearer "),
            Err(RevocationError::MissingCredentials)
        );
    }

    #[tokio::test]
    async fn revoked_token_is_rejected_even_though_otherwise_valid() {
        let cache = InMemoryRevocationCache::new();
        cache
            .revoke("still.cryptographically.fine", Duration::hours(1))
            .await
            .unwrap();

        let gate = RevocationGate::new(cache);
        assert_eq!(
            gate.authorize("still.cryptographically.fine").await,
            Err(RevocationError::TokenRevoked)
        );
        assert_eq!(gate.authorize("some.other.token").await, Ok(()));
    }

    #[tokio::test]
    async fn expired_entry_admits_the_token_again() {
        let cache = InMemoryRevocationCache::new();
        cache
            .revoke("short.lived", Duration::seconds(-1))
            .await
            .unwrap();

        let gate = RevocationGate::new(cache);
        assert_eq!(gate.authorize("short.lived").await, Ok(()));
    }

    #[tokio::test]
    async fn header_form_checks_the_extracted_token() {
        let cache = InMemoryRevocationCache::new();
        cache.revoke("tok", Duration::hours(1)).await.unwrap();

        let gate = RevocationGate::new(cache);
        assert_eq!(
            gate.authorize_header("Bearer tok").await,
            Err(RevocationError::TokenRevoked)
        );
        assert_eq!(
            gate.authorize_header("nonsense").await,
            Err(RevocationError::MissingCredentials)
        );
    }
}
