use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a session token at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Active,
    Expired,
    LoggedOut,
}

/// A persisted session token bound to one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub access_token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub logged_out_at: Option<DateTime<Utc>>,
}

impl SessionToken {
    pub fn new(
        user_id: Uuid,
        access_token: String,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            access_token,
            issued_at,
            expires_at,
            logged_out_at: None,
        }
    }

    /// Explicit sign-out wins over expiry.
    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        if self.logged_out_at.is_some() {
            TokenState::LoggedOut
        } else if now >= self.expires_at {
            TokenState::Expired
        } else {
            TokenState::Active
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == TokenState::Active
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }

    pub fn is_logged_out(&self) -> bool {
        self.logged_out_at.is_some()
    }

    /// Marks the token logged out. The first sign-out instant is kept.
    /// Returns false when the token was already logged out.
    pub fn mark_logged_out(&mut self, at: DateTime<Utc>) -> bool {
        if self.logged_out_at.is_some() {
            return false;
        }
        self.logged_out_at = Some(at);
        true
    }
}
