/// Postgres session store
///
/// Access tokens are hashed with SHA-256 before storage and looked up by
/// that hash; the plaintext bearer token never reaches the database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::configuration::DatabaseSettings;
use crate::domain::{SessionToken, UserRecord};
use crate::error::StoreError;
use crate::store::{SessionStore, StoreTransaction};

#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a connection pool from settings
    ///
    /// # Errors
    /// Returns error if the database cannot be reached
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, StoreError> {
        tracing::info!(
            host = %settings.host,
            database = %settings.database_name,
            "Attempting to connect to database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect(&settings.connection_string())
            .await
            .map_err(|e| {
                tracing::error!("Failed to create connection pool: {}", e);
                StoreError::from(e)
            })?;

        tracing::info!("Database connection pool created successfully");
        Ok(Self::new(pool))
    }

    /// Apply the bundled migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    type Transaction = PgTransaction;

    async fn begin(&self) -> Result<PgTransaction, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgTransaction { tx })
    }
}

/// Rolls back on drop unless committed
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    salt: String,
    password_digest: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            salt: row.salt,
            password_digest: row.password_digest,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: Uuid,
    user_id: Uuid,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    logged_out_at: Option<DateTime<Utc>>,
}

impl TokenRow {
    fn into_token(self, access_token: &str) -> SessionToken {
        SessionToken {
            id: self.id,
            user_id: self.user_id,
            access_token: access_token.to_string(),
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            logged_out_at: self.logged_out_at,
        }
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn find_user_by_username(
        &mut self,
        username: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, salt, password_digest, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(UserRecord::from))
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, email, salt, password_digest, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(UserRecord::from))
    }

    async fn create_user(&mut self, user: UserRecord) -> Result<UserRecord, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, salt, password_digest, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.salt)
        .bind(&user.password_digest)
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(user)
    }

    async fn create_token(&mut self, token: SessionToken) -> Result<SessionToken, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_auth_tokens
                (id, user_id, access_token_hash, issued_at, expires_at, logged_out_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(hash_token(&token.access_token))
        .bind(token.issued_at)
        .bind(token.expires_at)
        .bind(token.logged_out_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(token)
    }

    async fn find_token_by_value(
        &mut self,
        access_token: &str,
    ) -> Result<Option<SessionToken>, StoreError> {
        // Row lock so a concurrent sign-out of the same token waits for us.
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT id, user_id, issued_at, expires_at, logged_out_at
            FROM user_auth_tokens
            WHERE access_token_hash = $1
            FOR UPDATE
            "#,
        )
        .bind(hash_token(access_token))
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(|row| row.into_token(access_token)))
    }

    async fn update_token(&mut self, token: SessionToken) -> Result<SessionToken, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE user_auth_tokens
            SET expires_at = $1, logged_out_at = $2
            WHERE id = $3 AND access_token_hash = $4
            "#,
        )
        .bind(token.expires_at)
        .bind(token.logged_out_at)
        .bind(token.id)
        .bind(hash_token(&token.access_token))
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::TokenNotFound(token.id.to_string()));
        }
        Ok(token)
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

/// Hash an access token using SHA-256
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_hashing() {
        let hash1 = hash_token("some.jwt.value");
        let hash2 = hash_token("some.jwt.value");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, "some.jwt.value");
        assert_eq!(hash1.len(), 64);
        assert_ne!(hash1, hash_token("other.jwt.value"));
    }

    #[test]
    fn test_token_row_keeps_caller_value() {
        let now = Utc::now();
        let row = TokenRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            issued_at: now,
            expires_at: now,
            logged_out_at: None,
        };

        let token = row.into_token("bearer");
        assert_eq!(token.access_token, "bearer");
        assert!(token.logged_out_at.is_none());
    }
}
