/// Authentication Service
///
/// Sign-up, sign-in and sign-out. Writes happen inside one store transaction
/// that is committed only when the operation succeeds. No transaction is
/// held open while bcrypt runs.

use chrono::{Duration, Utc};

use crate::auth::{digests_match, CredentialHasher, TokenIssuer};
use crate::configuration::Settings;
use crate::domain::{SessionToken, UserRecord};
use crate::error::{AuthError, ErrorContext};
use crate::store::{SessionStore, StoreTransaction};

/// Session lifetime used unless overridden
pub const DEFAULT_SESSION_HOURS: i64 = 8;

pub struct AuthenticationService<S> {
    store: S,
    hasher: CredentialHasher,
    issuer: TokenIssuer,
    session_ttl: Duration,
}

impl<S: SessionStore> AuthenticationService<S> {
    pub fn new(store: S, hasher: CredentialHasher, issuer: TokenIssuer) -> Self {
        Self {
            store,
            hasher,
            issuer,
            session_ttl: Duration::hours(DEFAULT_SESSION_HOURS),
        }
    }

    pub fn from_settings(store: S, settings: &Settings) -> Self {
        Self::new(
            store,
            CredentialHasher::new(settings.hasher.cost),
            TokenIssuer::from_settings(&settings.token),
        )
        .with_session_ttl(Duration::hours(settings.token.expiry_hours))
    }

    pub fn with_session_ttl(mut self, session_ttl: Duration) -> Self {
        self.session_ttl = session_ttl;
        self
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Register a new user
    ///
    /// The username is checked before the email, so a request colliding on
    /// both fails with `DuplicateUsername`.
    ///
    /// # Errors
    /// - `DuplicateUsername` / `DuplicateEmail` when either is taken
    /// - `Store` / `Hashing` on internal failures
    pub async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, AuthError> {
        let context = ErrorContext::new("sign_up").with_username(username);

        match self.try_sign_up(username, email, password).await {
            Ok(user) => {
                tracing::info!(
                    request_id = %context.request_id,
                    user_id = %user.id,
                    "User signed up successfully"
                );
                Ok(user)
            }
            Err(e) => {
                context.log_error(&e);
                Err(e)
            }
        }
    }

    /// Authenticate a user and issue a new session token
    ///
    /// # Errors
    /// - `UnknownUser` when no user has this username
    /// - `BadCredentials` when the password does not match
    /// - `Store` / `Hashing` / `Token` on internal failures
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<SessionToken, AuthError> {
        let context = ErrorContext::new("sign_in").with_username(username);

        match self.try_sign_in(username, password).await {
            Ok(token) => {
                tracing::info!(
                    request_id = %context.request_id,
                    user_id = %token.user_id,
                    expires_at = %token.expires_at,
                    "User signed in successfully"
                );
                Ok(token)
            }
            Err(e) => {
                context.log_error(&e);
                Err(e)
            }
        }
    }

    /// Mark a session token as logged out
    ///
    /// Expiry is not checked: an expired token can still be signed out.
    /// Signing out twice returns the token with its first sign-out time.
    ///
    /// # Errors
    /// - `NotSignedIn` when the token is unknown
    /// - `Store` on internal failures
    pub async fn sign_out(&self, access_token: &str) -> Result<SessionToken, AuthError> {
        let context = ErrorContext::new("sign_out");

        match self.try_sign_out(access_token).await {
            Ok(token) => {
                tracing::info!(
                    request_id = %context.request_id,
                    user_id = %token.user_id,
                    "User signed out successfully"
                );
                Ok(token)
            }
            Err(e) => {
                context.log_error(&e);
                Err(e)
            }
        }
    }

    async fn try_sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserRecord, AuthError> {
        // Early rejection, so duplicates cost no bcrypt work.
        {
            let mut tx = self.store.begin().await?;
            ensure_available(&mut tx, username, email).await?;
        }

        let password = password.to_string();
        let salted = self
            .run_hasher(move |hasher| hasher.generate_salted_digest(&password))
            .await?;

        // Checked again: another sign-up may have won while we were hashing.
        let mut tx = self.store.begin().await?;
        ensure_available(&mut tx, username, email).await?;
        let user = tx
            .create_user(UserRecord::new(
                username.to_string(),
                email.to_string(),
                salted.salt,
                salted.digest,
            ))
            .await?;
        tx.commit().await?;

        Ok(user)
    }

    async fn try_sign_in(&self, username: &str, password: &str) -> Result<SessionToken, AuthError> {
        // User records are never modified after creation, so the lookup
        // transaction can close before hashing.
        let user = {
            let mut tx = self.store.begin().await?;
            tx.find_user_by_username(username)
                .await?
                .ok_or(AuthError::UnknownUser)?
        };

        let password = password.to_string();
        let salt = user.salt.clone();
        let stored_digest = user.password_digest.clone();
        let attempt = self
            .run_hasher(move |hasher| hasher.verify_against(&password, &salt, &stored_digest))
            .await?;

        if !digests_match(&attempt, &user.password_digest) {
            return Err(AuthError::BadCredentials);
        }

        let issued_at = Utc::now();
        let expires_at = issued_at + self.session_ttl;
        let access_token = self.issuer.issue(&user.id, issued_at, expires_at, &attempt)?;

        let mut tx = self.store.begin().await?;
        let token = tx
            .create_token(SessionToken::new(user.id, access_token, issued_at, expires_at))
            .await?;
        tx.commit().await?;

        Ok(token)
    }

    async fn try_sign_out(&self, access_token: &str) -> Result<SessionToken, AuthError> {
        let mut tx = self.store.begin().await?;

        let mut token = tx
            .find_token_by_value(access_token)
            .await?
            .ok_or(AuthError::NotSignedIn)?;

        if token.mark_logged_out(Utc::now()) {
            token = tx.update_token(token).await?;
        } else {
            tracing::debug!(user_id = %token.user_id, "Session token already signed out");
        }
        tx.commit().await?;

        Ok(token)
    }

    /// bcrypt is CPU-bound; keep it off the async worker threads.
    async fn run_hasher<T, F>(&self, f: F) -> Result<T, AuthError>
    where
        F: FnOnce(&CredentialHasher) -> Result<T, AuthError> + Send + 'static,
        T: Send + 'static,
    {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || f(&hasher))
            .await
            .map_err(|e| AuthError::Hashing(format!("hashing task failed: {}", e)))?
    }
}

/// Username is checked first
async fn ensure_available<T: StoreTransaction>(
    tx: &mut T,
    username: &str,
    email: &str,
) -> Result<(), AuthError> {
    if tx.find_user_by_username(username).await?.is_some() {
        return Err(AuthError::DuplicateUsername);
    }
    if tx.find_user_by_email(email).await?.is_some() {
        return Err(AuthError::DuplicateEmail);
    }
    Ok(())
}
