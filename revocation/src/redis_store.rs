//! Redis-based revocation cache implementation.
//!
//! # Architecture
//!
//! Entries are stored in Redis as:
//! - **Key**: `revocation:token:{token}` → `"blacklisted"`
//! - **TTL**: the token's remaining validity window (SETEX)
//!
//! SETEX is atomic (SET + EXPIRE in one command), so concurrent writers
//! need no coordination, and Redis-level expiry guarantees the blacklist
//! cannot accumulate unboundedly.

use crate::cache::RevocationCache;
use crate::error::{Result, RevocationError};
use chrono::Duration;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

/// Value stored under a blacklisted token's key.
const BLACKLISTED: &str = "blacklisted";

/// `Redis`-backed revocation cache.
///
/// # Thread Safety
///
/// This type is `Clone` and can be safely shared across threads.
/// Each clone shares the same `ConnectionManager` (connection pool).
pub struct RedisRevocationCache {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl RedisRevocationCache {
    /// Create a new `Redis` revocation cache.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - `Redis` connection URL (e.g., "<redis://127.0.0.1:6379>")
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the `Redis` URL is malformed
    /// - the connection to the `Redis` server fails
    /// - authentication fails
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            RevocationError::Cache(format!("Failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            RevocationError::Cache(format!("Failed to create Redis connection manager: {e}"))
        })?;

        tracing::info!("RedisRevocationCache initialized successfully");

        Ok(Self { conn_manager })
    }

    /// The `Redis` key for a token.
    ///
    /// The `revocation:token:` prefix prevents collisions with other keys
    /// in shared `Redis` instances.
    fn token_key(token: &str) -> String {
        format!("revocation:token:{token}")
    }
}

impl Clone for RedisRevocationCache {
    fn clone(&self) -> Self {
        Self {
            conn_manager: self.conn_manager.clone(),
        }
    }
}

impl RevocationCache for RedisRevocationCache {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let key = Self::token_key(token);

        #[allow(clippy::cast_sign_loss)]
        let ttl_seconds = ttl.num_seconds().max(1) as u64;

        // SETEX is atomic: SET + EXPIRE in one command.
        let _: () = conn
            .set_ex(&key, BLACKLISTED, ttl_seconds)
            .await
            .map_err(|e| RevocationError::Cache(format!("Failed to revoke token: {e}")))?;

        tracing::info!(ttl_seconds, "token blacklisted");
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let key = Self::token_key(token);

        let value: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| RevocationError::Cache(format!("Failed to check token: {e}")))?;

        Ok(value.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_key_is_namespaced() {
        assert_eq!(
            RedisRevocationCache::token_key("abc.def.ghi"),
            "revocation:token:abc.def.ghi"
        );
    }
}
