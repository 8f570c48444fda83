//! Mock cart repository for testing.

use crate::records::Cart;
use crate::repository::{CartRepository, RepositoryError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// In-memory cart repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartRepository {
    carts: Arc<Mutex<HashMap<Uuid, Cart>>>,
}

impl InMemoryCartRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly (test arrangement).
    pub fn seed(&self, cart: Cart) {
        self.carts.lock().unwrap().insert(cart.id, cart);
    }

    /// Read a record directly (test assertion).
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Cart> {
        self.carts.lock().unwrap().get(&id).cloned()
    }

    /// Read a user's cart directly (test assertion).
    #[must_use]
    pub fn get_by_user(&self, user_id: Uuid) -> Option<Cart> {
        self.carts
            .lock()
            .unwrap()
            .values()
            .find(|cart| cart.user_id == user_id)
            .cloned()
    }

    /// Whether the repository holds no carts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.carts.lock().unwrap().is_empty()
    }
}

impl CartRepository for InMemoryCartRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Cart>, RepositoryError> {
        Ok(self.carts.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Cart>, RepositoryError> {
        Ok(self.get_by_user(user_id))
    }

    async fn upsert(&self, cart: Cart) -> Result<(), RepositoryError> {
        self.carts.lock().unwrap().insert(cart.id, cart);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.carts.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Cart>, RepositoryError> {
        Ok(self.carts.lock().unwrap().values().cloned().collect())
    }
}
