//! Revocation cache trait and configuration.

use crate::error::Result;
use chrono::Duration;

/// A TTL-bounded credential blacklist.
///
/// # Implementation Notes
///
/// - `revoke` must be atomic (one SETEX-style write); the cache is
///   multi-writer-safe by key-level atomicity, no extra locking needed
/// - entries must expire on their own after the given TTL
/// - `is_revoked` is on every request's hot path; lookups must be cheap
pub trait RevocationCache: Send + Sync {
    /// Blacklist a token for `ttl`.
    ///
    /// The TTL must bound the token's remaining validity window: once the
    /// token would have expired anyway, the entry may disappear.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache backend is unreachable or the write
    /// fails.
    fn revoke(
        &self,
        token: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Whether a token is currently blacklisted.
    ///
    /// Expired entries count as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache backend is unreachable.
    fn is_revoked(&self, token: &str) -> impl std::future::Future<Output = Result<bool>> + Send;
}

/// Revocation configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationConfig {
    /// How long a blacklist entry lives.
    ///
    /// Must cover the longest credential lifetime the identity service
    /// issues, so a revoked token stays rejected until it would have
    /// expired naturally.
    ///
    /// Default: 1 hour
    pub ttl: Duration,
}

impl RevocationConfig {
    /// Create configuration with the default TTL.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ttl: Duration::hours(1),
        }
    }

    /// Set the blacklist TTL.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

impl Default for RevocationConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = RevocationConfig::new().with_ttl(Duration::minutes(30));
        assert_eq!(config.ttl, Duration::minutes(30));
        assert_eq!(RevocationConfig::default().ttl, Duration::hours(1));
    }
}
