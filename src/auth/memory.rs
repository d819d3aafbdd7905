//! In-memory `AccountStore` used by the test suite.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::{AccountStore, StoreError};
use crate::auth::repo_types::{NewUser, UniqueField, User};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    by_email: HashMap<String, Uuid>,
    by_username: HashMap<String, Uuid>,
}

/// Both unique indexes live under one lock, so check-and-insert is atomic.
#[derive(Clone, Default)]
pub struct MemoryAccountStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables.lock().expect("memory store lock").users.len()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".into())
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_email_or_username(
        &self,
        email: &str,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().map_err(poisoned)?;
        let id = tables
            .by_email
            .get(email)
            .or_else(|| tables.by_username.get(username));
        Ok(id.and_then(|id| tables.users.get(id)).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().map_err(poisoned)?;
        Ok(tables
            .by_email
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.lock().map_err(poisoned)?;
        if tables.by_email.contains_key(&user.email) {
            return Err(StoreError::DuplicateKey(UniqueField::Email));
        }
        if tables.by_username.contains_key(&user.username) {
            return Err(StoreError::DuplicateKey(UniqueField::Username));
        }

        let record = User {
            id: Uuid::new_v4(),
            full_name: user.full_name,
            username: user.username,
            email: user.email,
            phone_number: user.phone_number,
            password_hash: user.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        tables.by_email.insert(record.email.clone(), record.id);
        tables.by_username.insert(record.username.clone(), record.id);
        tables.users.insert(record.id, record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            full_name: "Ada Lovelace".into(),
            username: username.into(),
            email: email.into(),
            phone_number: "5551234567".into(),
            password_hash: "$argon2id$placeholder".into(),
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email_and_username() {
        let store = MemoryAccountStore::new();
        store.create(new_user("a@example.com", "ada")).await.unwrap();

        let err = store
            .create(new_user("a@example.com", "other"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(UniqueField::Email)));

        let err = store
            .create(new_user("b@example.com", "ada"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey(UniqueField::Username)));

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn lookups_prefer_email_match() {
        let store = MemoryAccountStore::new();
        let first = store.create(new_user("a@example.com", "ada")).await.unwrap();
        let second = store.create(new_user("b@example.com", "bob")).await.unwrap();

        let found = store
            .find_by_email_or_username("b@example.com", "ada")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, second.id);

        let found = store
            .find_by_email_or_username("nobody@example.com", "ada")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, first.id);

        assert!(store.find_by_email("c@example.com").await.unwrap().is_none());
    }
}
