//! # Shopwire Revocation
//!
//! TTL-bounded credential blacklist shared by every service.
//!
//! When an account is deleted, the cart service's `user.deleted` handler
//! writes the account's credential token here; every authenticated request
//! then checks the token against this cache **before** trusting its own
//! cryptographic validity. Entries expire on their own once the token's
//! natural lifetime has passed, so the blacklist never grows without
//! bound.
//!
//! ## Write/read discipline
//!
//! - Write path: exclusively the `user.deleted` event handler
//! - Read path: every authenticated request, via [`RevocationGate`]
//! - Nothing deletes or overwrites an entry; expiry is TTL-only
//!
//! ## Implementations
//!
//! - [`RedisRevocationCache`]: production, one shared Redis
//! - [`InMemoryRevocationCache`]: tests (feature `test-utils`, default on)

mod cache;
mod error;
mod gate;
mod redis_store;

#[cfg(any(test, feature = "test-utils"))]
mod memory;

pub use cache::{RevocationCache, RevocationConfig};
pub use error::{Result, RevocationError};
pub use gate::{RevocationGate, extract_bearer};
pub use redis_store::RedisRevocationCache;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::InMemoryRevocationCache;
