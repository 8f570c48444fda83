//! Mock user repository for testing.

use crate::records::UserRecord;
use crate::repository::{RepositoryError, UserRepository};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// In-memory user repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserRepository {
    users: Arc<Mutex<HashMap<Uuid, UserRecord>>>,
}

impl InMemoryUserRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly (test arrangement).
    pub fn seed(&self, user: UserRecord) {
        self.users.lock().unwrap().insert(user.id, user);
    }

    /// Read a record directly (test assertion).
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<UserRecord> {
        self.users.lock().unwrap().get(&id).cloned()
    }
}

impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepositoryError> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn upsert(&self, user: UserRecord) -> Result<(), RepositoryError> {
        self.users.lock().unwrap().insert(user.id, user);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.users.lock().unwrap().remove(&id);
        Ok(())
    }
}
