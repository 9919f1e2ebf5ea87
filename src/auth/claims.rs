/// Session Token Claims
///
/// Payload of a signed session token: who it represents and when it
/// stops being valid (RFC 7519 registered claims).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Unique token ID, fresh for every issuance
    pub jti: String,
}

impl SessionClaims {
    pub fn new(
        user_id: Uuid,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        issuer: String,
    ) -> Self {
        Self {
            sub: user_id.to_string(),
            iss: issuer,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// Returns error if the subject is not a valid UUID
    pub fn user_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AuthError::Token("Invalid user ID in token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let claims = SessionClaims::new(user_id, now, now + Duration::hours(8), "test".to_string());

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.iss, "test");
        assert_eq!(claims.exp - claims.iat, 8 * 3600);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_each_claims_set_gets_its_own_id() {
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let a = SessionClaims::new(user_id, now, now, "test".to_string());
        let b = SessionClaims::new(user_id, now, now, "test".to_string());

        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_invalid_user_id() {
        let now = Utc::now();
        let mut claims = SessionClaims::new(Uuid::new_v4(), now, now, "test".to_string());
        claims.sub = "invalid-uuid".to_string();

        assert!(claims.user_id().is_err());
    }
}
