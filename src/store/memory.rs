/// In-memory session store
///
/// Backed by a single `tokio::sync::Mutex`. A transaction holds the lock for
/// its whole lifetime and writes to a private copy of the state, so
/// transactions are serializable and uncommitted work simply disappears.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{SessionToken, UserRecord};
use crate::error::{StoreError, UniqueField};
use crate::store::{SessionStore, StoreTransaction};

#[derive(Debug, Default, Clone)]
struct StoreState {
    users: HashMap<Uuid, UserRecord>,
    /// Keyed by access token value
    tokens: HashMap<String, SessionToken>,
}

/// Process-local store for tests and embedded use
#[derive(Debug, Default, Clone)]
pub struct InMemorySessionStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed user records
    pub async fn user_count(&self) -> usize {
        self.state.lock().await.users.len()
    }

    /// Number of committed token records
    pub async fn token_count(&self) -> usize {
        self.state.lock().await.tokens.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction { guard, working })
    }
}

pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<StoreState>,
    working: StoreState,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn find_user_by_username(
        &mut self,
        username: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .working
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .working
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn create_user(&mut self, user: UserRecord) -> Result<UserRecord, StoreError> {
        let users = &self.working.users;
        if users.values().any(|existing| existing.username == user.username) {
            return Err(StoreError::UniqueViolation(UniqueField::Username));
        }
        if users.values().any(|existing| existing.email == user.email) {
            return Err(StoreError::UniqueViolation(UniqueField::Email));
        }

        self.working.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn create_token(&mut self, token: SessionToken) -> Result<SessionToken, StoreError> {
        if self.working.tokens.contains_key(&token.access_token) {
            return Err(StoreError::DuplicateToken);
        }

        self.working
            .tokens
            .insert(token.access_token.clone(), token.clone());
        Ok(token)
    }

    async fn find_token_by_value(
        &mut self,
        access_token: &str,
    ) -> Result<Option<SessionToken>, StoreError> {
        Ok(self.working.tokens.get(access_token).cloned())
    }

    async fn update_token(&mut self, token: SessionToken) -> Result<SessionToken, StoreError> {
        match self.working.tokens.get_mut(&token.access_token) {
            Some(stored) => {
                *stored = token.clone();
                Ok(token)
            }
            None => Err(StoreError::TokenNotFound(token.id.to_string())),
        }
    }

    async fn commit(self) -> Result<(), StoreError> {
        let InMemoryTransaction { mut guard, working } = self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn user(username: &str, email: &str) -> UserRecord {
        UserRecord::new(
            username.to_string(),
            email.to_string(),
            "00".repeat(16),
            "$2b$04$digest".to_string(),
        )
    }

    #[tokio::test]
    async fn test_committed_user_is_visible() {
        let store = InMemorySessionStore::new();

        let mut tx = store.begin().await.unwrap();
        let created = tx.create_user(user("alice", "a@x.com")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let found = tx.find_user_by_username("alice").await.unwrap();
        assert_eq!(found, Some(created.clone()));
        assert_eq!(tx.find_user_by_email("a@x.com").await.unwrap(), Some(created));
        assert!(tx.find_user_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = InMemorySessionStore::new();

        {
            let mut tx = store.begin().await.unwrap();
            tx.create_user(user("alice", "a@x.com")).await.unwrap();
        }

        assert_eq!(store.user_count().await, 0);
    }

    #[tokio::test]
    async fn test_unique_constraints() {
        let store = InMemorySessionStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.create_user(user("alice", "a@x.com")).await.unwrap();

        let err = tx.create_user(user("alice", "b@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(UniqueField::Username)));

        let err = tx.create_user(user("bob", "a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(UniqueField::Email)));
    }

    #[tokio::test]
    async fn test_token_update_roundtrip() {
        let store = InMemorySessionStore::new();
        let now = Utc::now();
        let token = SessionToken::new(Uuid::new_v4(), "opaque".to_string(), now, now + Duration::hours(8));

        let mut tx = store.begin().await.unwrap();
        tx.create_token(token.clone()).await.unwrap();
        assert!(matches!(
            tx.create_token(token.clone()).await,
            Err(StoreError::DuplicateToken)
        ));

        let mut updated = token.clone();
        updated.mark_logged_out(now);
        tx.update_token(updated.clone()).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.find_token_by_value("opaque").await.unwrap(), Some(updated));
        assert!(tx.find_token_by_value("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_of_unknown_token_fails() {
        let store = InMemorySessionStore::new();
        let now = Utc::now();
        let token = SessionToken::new(Uuid::new_v4(), "ghost".to_string(), now, now);

        let mut tx = store.begin().await.unwrap();
        assert!(matches!(
            tx.update_token(token).await,
            Err(StoreError::TokenNotFound(_))
        ));
    }
}
