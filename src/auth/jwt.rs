/// Session Token Issuing
///
/// Signs session tokens as HS512 JWTs. The HMAC key is the configured
/// secret followed by the signing user's freshly computed password digest.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::SessionClaims;
use crate::configuration::TokenSettings;
use crate::error::AuthError;

#[derive(Debug, Clone)]
pub struct TokenIssuer {
    issuer: String,
    secret: String,
}

impl TokenIssuer {
    pub fn new(issuer: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            secret: secret.into(),
        }
    }

    pub fn from_settings(settings: &TokenSettings) -> Self {
        Self::new(settings.issuer.clone(), settings.secret.clone())
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue a new session token for a user
    ///
    /// # Arguments
    /// * `user_id` - Subject of the token
    /// * `issued_at` - Issuance instant
    /// * `expires_at` - Expiry instant
    /// * `signing_digest` - Password digest computed during this sign-in
    ///
    /// # Errors
    /// Returns error if token encoding fails
    pub fn issue(
        &self,
        user_id: &Uuid,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        signing_digest: &str,
    ) -> Result<String, AuthError> {
        let claims = SessionClaims::new(*user_id, issued_at, expires_at, self.issuer.clone());

        encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(&self.signing_key(signing_digest)),
        )
        .map_err(|e| AuthError::Token(e.to_string()))
    }

    /// Decode and verify a token issued with the same digest
    ///
    /// # Errors
    /// Returns error if the token is malformed, tampered with, expired or
    /// issued by someone else
    pub fn decode(&self, token: &str, signing_digest: &str) -> Result<SessionClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS512);
        validation.set_issuer(&[&self.issuer]);

        decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(&self.signing_key(signing_digest)),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::warn!("Session token validation error: {}", e);
            AuthError::Token("Invalid or expired token".to_string())
        })
    }

    fn signing_key(&self, signing_digest: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.secret.len() + signing_digest.len());
        key.extend_from_slice(self.secret.as_bytes());
        key.extend_from_slice(signing_digest.as_bytes());
        key
    }
}
