use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user
///
/// Holds the salt and derived digest, never the plaintext password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Stable unique identifier
    pub id: Uuid,
    /// Unique login name
    pub username: String,
    /// Unique email address
    pub email: String,
    /// Hex-encoded random salt, fixed at sign-up
    #[serde(skip_serializing)]
    pub salt: String,
    /// Salted password digest
    #[serde(skip_serializing)]
    pub password_digest: String,
    /// When the account was created
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(username: String, email: String, salt: String, password_digest: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            salt,
            password_digest,
            created_at: Utc::now(),
        }
    }
}
