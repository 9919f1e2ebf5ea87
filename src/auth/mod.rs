/// Authentication primitives
///
/// Handles salted password digests and session token issuing.

mod claims;
mod jwt;
mod password;

pub use claims::SessionClaims;
pub use jwt::TokenIssuer;
pub use password::digests_match;
pub use password::CredentialHasher;
pub use password::SaltedDigest;
