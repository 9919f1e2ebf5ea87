/// Error Handling Module
///
/// Two layers of errors:
/// 1. `StoreError` - failures reported by a session store adapter
/// 2. `AuthError` - the outcome taxonomy of the authentication service,
///    each kind carrying a stable code and message for callers
///
/// `ErrorContext` enriches log events emitted when an operation fails.

use std::fmt;

use thiserror::Error;

// ============================================================================
// STORE ERRORS
// ============================================================================

/// Column guarded by a uniqueness constraint in the user table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueField::Username => write!(f, "username"),
            UniqueField::Email => write!(f, "email"),
        }
    }
}

/// Errors raised by a session store adapter
///
/// Absence of a record is never an error; lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate entry: {0} already taken")]
    UniqueViolation(UniqueField),

    #[error("Token record not found: {0}")]
    TokenNotFound(String),

    #[error("Duplicate entry: access token already stored")]
    DuplicateToken,

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let violated_constraint = err
            .as_database_error()
            .filter(|db_err| db_err.code().map_or(false, |code| code == UNIQUE_VIOLATION))
            .map(|db_err| db_err.message().to_string());

        match violated_constraint {
            Some(msg) if msg.contains("users_username_key") => {
                StoreError::UniqueViolation(UniqueField::Username)
            }
            Some(msg) if msg.contains("users_email_key") => {
                StoreError::UniqueViolation(UniqueField::Email)
            }
            Some(msg) if msg.contains("access_token_hash") => StoreError::DuplicateToken,
            _ => StoreError::Database(err),
        }
    }
}

// ============================================================================
// AUTHENTICATION ERRORS
// ============================================================================

/// Every failure the authentication service can surface to its caller
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username already exists")]
    DuplicateUsername,

    #[error("Email already exists")]
    DuplicateEmail,

    #[error("This username does not exist")]
    UnknownUser,

    #[error("Password failed")]
    BadCredentials,

    #[error("User is not Signed in")]
    NotSignedIn,

    #[error(transparent)]
    Store(StoreError),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Token generation failed: {0}")]
    Token(String),
}

impl AuthError {
    /// Stable code for client-side handling
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::DuplicateUsername => "SGR-001",
            AuthError::DuplicateEmail => "SGR-002",
            AuthError::UnknownUser => "ATH-001",
            AuthError::BadCredentials => "ATH-002",
            AuthError::NotSignedIn => "SGR-001",
            AuthError::Store(_) => "STORE_ERROR",
            AuthError::Hashing(_) => "HASHING_ERROR",
            AuthError::Token(_) => "TOKEN_ERROR",
        }
    }

    /// True for outcomes caused by caller input or state rather than an
    /// internal fault
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            AuthError::DuplicateUsername
                | AuthError::DuplicateEmail
                | AuthError::UnknownUser
                | AuthError::BadCredentials
                | AuthError::NotSignedIn
        )
    }
}

// A constraint violation at insert time means a concurrent sign-up won the race.
impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(UniqueField::Username) => AuthError::DuplicateUsername,
            StoreError::UniqueViolation(UniqueField::Email) => AuthError::DuplicateEmail,
            StoreError::TokenNotFound(_) => AuthError::NotSignedIn,
            other => AuthError::Store(other),
        }
    }
}

// ============================================================================
// ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Error context for enhanced logging and debugging
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub username: Option<String>,
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            username: None,
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn log_error(&self, error: &AuthError) {
        let context = serde_json::json!({
            "request_id": self.request_id,
            "operation": self.operation,
            "username": self.username,
            "timestamp": self.timestamp.to_rfc3339(),
        });

        if error.is_expected() {
            tracing::warn!(
                error = %error,
                code = error.code(),
                context = ?context,
                "Authentication request rejected"
            );
        } else {
            tracing::error!(
                error = %error,
                code = error.code(),
                context = ?context,
                "Authentication request failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(AuthError::DuplicateUsername.code(), "SGR-001");
        assert_eq!(AuthError::DuplicateEmail.code(), "SGR-002");
        assert_eq!(AuthError::UnknownUser.code(), "ATH-001");
        assert_eq!(AuthError::BadCredentials.code(), "ATH-002");
        assert_eq!(AuthError::NotSignedIn.code(), "SGR-001");
    }

    #[test]
    fn test_messages() {
        assert_eq!(AuthError::DuplicateUsername.to_string(), "Username already exists");
        assert_eq!(AuthError::NotSignedIn.to_string(), "User is not Signed in");
    }

    #[test]
    fn test_unique_violation_maps_to_duplicate_kind() {
        let err: AuthError = StoreError::UniqueViolation(UniqueField::Username).into();
        assert!(matches!(err, AuthError::DuplicateUsername));

        let err: AuthError = StoreError::UniqueViolation(UniqueField::Email).into();
        assert!(matches!(err, AuthError::DuplicateEmail));
    }

    #[test]
    fn test_internal_errors_are_not_expected() {
        let err: AuthError = StoreError::Database(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(err, AuthError::Store(_)));
        assert!(!err.is_expected());
        assert_eq!(err.code(), "STORE_ERROR");
        assert!(AuthError::BadCredentials.is_expected());
    }

    #[test]
    fn test_non_database_sqlx_error_is_not_a_violation() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn test_error_context_creation() {
        let ctx = ErrorContext::new("sign_in");
        assert_eq!(ctx.operation, "sign_in");
        assert!(ctx.username.is_none());

        let other = ErrorContext::new("sign_in");
        assert_ne!(ctx.request_id, other.request_id);

        let ctx = ctx.with_username("dave");
        assert_eq!(ctx.username.as_deref(), Some("dave"));
    }
}
