//! In-memory revocation cache for testing.

use crate::cache::RevocationCache;
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory revocation cache honoring entry expiry.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRevocationCache {
    entries: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
}

impl InMemoryRevocationCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries, for assertions.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.entries
            .lock()
            .unwrap()
            .values()
            .filter(|expires_at| **expires_at > now)
            .count()
    }

    /// Whether the cache holds no live entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RevocationCache for InMemoryRevocationCache {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(token.to_string(), Utc::now() + ttl);
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(token) {
            Some(expires_at) if *expires_at > Utc::now() => Ok(true),
            Some(_) => {
                // Expired: the real cache would have evicted it already.
                entries.remove(token);
                Ok(false)
            }
            None => Ok(false),
        }
    }
}
