/// Session Store Adapters
///
/// The authentication service reads and writes users and session tokens
/// only through a [`StoreTransaction`] opened by a [`SessionStore`]. Every
/// service operation writes inside exactly one transaction; dropping a
/// transaction without committing discards its writes.

use async_trait::async_trait;

use crate::domain::{SessionToken, UserRecord};
use crate::error::StoreError;

mod memory;
mod postgres;

pub use memory::{InMemorySessionStore, InMemoryTransaction};
pub use postgres::{PgSessionStore, PgTransaction};

/// Opens units of work against the backing store
#[async_trait]
pub trait SessionStore: Send + Sync {
    type Transaction: StoreTransaction;

    async fn begin(&self) -> Result<Self::Transaction, StoreError>;
}

/// One atomic unit of work
///
/// Lookups return `Ok(None)` when nothing matches.
#[async_trait]
pub trait StoreTransaction: Send {
    async fn find_user_by_username(&mut self, username: &str)
        -> Result<Option<UserRecord>, StoreError>;

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Fails with `StoreError::UniqueViolation` when the username or email
    /// is already taken.
    async fn create_user(&mut self, user: UserRecord) -> Result<UserRecord, StoreError>;

    async fn create_token(&mut self, token: SessionToken) -> Result<SessionToken, StoreError>;

    async fn find_token_by_value(
        &mut self,
        access_token: &str,
    ) -> Result<Option<SessionToken>, StoreError>;

    async fn update_token(&mut self, token: SessionToken) -> Result<SessionToken, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;
}
