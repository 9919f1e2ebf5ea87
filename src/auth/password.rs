/// Password Hashing and Verification
///
/// Derives a salted bcrypt digest from a plaintext secret and recomputes it
/// at sign-in. The salt is generated here and stored next to the digest.
///
/// bcrypt only reads the first 72 bytes of its input, so the plaintext is
/// first reduced to a hex SHA-256 digest (64 bytes). Every byte of the
/// plaintext therefore affects the stored digest.

use bcrypt::{hash_with_salt, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::AuthError;

/// Salt length in bytes (128 bits, bcrypt's native salt size)
const SALT_BYTES: usize = 16;

/// Salt and digest produced at sign-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaltedDigest {
    /// Hex-encoded salt
    pub salt: String,
    /// bcrypt digest in `$2b$<cost>$...` form
    pub digest: String,
}

/// Credential hasher with a fixed bcrypt cost
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    cost: u32,
}

impl CredentialHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Generate a fresh random salt and the digest of `plaintext` under it
    ///
    /// # Errors
    /// Returns error if bcrypt rejects the configured cost
    pub fn generate_salted_digest(&self, plaintext: &str) -> Result<SaltedDigest, AuthError> {
        let mut salt = [0u8; SALT_BYTES];
        OsRng.fill_bytes(&mut salt);

        let digest = digest_with_salt(plaintext, salt, self.cost)?;

        Ok(SaltedDigest {
            salt: hex::encode(salt),
            digest,
        })
    }

    /// Recompute the digest of `plaintext` under a stored salt
    ///
    /// Compare the result with [`digests_match`], never with `==`.
    ///
    /// # Errors
    /// Returns error if the salt is not 16 hex-encoded bytes
    pub fn verify(&self, plaintext: &str, salt: &str) -> Result<String, AuthError> {
        digest_with_salt(plaintext, decode_salt(salt)?, self.cost)
    }

    /// Recompute the digest of `plaintext` for comparison with `stored_digest`
    ///
    /// Uses the cost recorded in `stored_digest`, so records created under
    /// an older cost setting keep verifying.
    pub fn verify_against(
        &self,
        plaintext: &str,
        salt: &str,
        stored_digest: &str,
    ) -> Result<String, AuthError> {
        let cost = recorded_cost(stored_digest).unwrap_or(self.cost);
        digest_with_salt(plaintext, decode_salt(salt)?, cost)
    }
}

/// Constant-time digest comparison
pub fn digests_match(a: &str, b: &str) -> bool {
    constant_time_eq(a.as_bytes(), b.as_bytes())
}

fn digest_with_salt(plaintext: &str, salt: [u8; SALT_BYTES], cost: u32) -> Result<String, AuthError> {
    hash_with_salt(prehash(plaintext), cost, salt)
        .map(|parts| parts.format_for_version(Version::TwoB))
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Fixed-length bcrypt input covering the whole plaintext
fn prehash(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

fn decode_salt(salt: &str) -> Result<[u8; SALT_BYTES], AuthError> {
    let mut raw = [0u8; SALT_BYTES];
    hex::decode_to_slice(salt, &mut raw)
        .map_err(|e| AuthError::Hashing(format!("stored salt is malformed: {}", e)))?;
    Ok(raw)
}

/// Cost field of a `$2b$<cost>$...` digest
fn recorded_cost(digest: &str) -> Option<u32> {
    digest.split('$').nth(2)?.parse().ok()
}

/// Visits every byte regardless of where the first difference is.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> CredentialHasher {
        CredentialHasher::new(4)
    }

    #[test]
    fn test_verify_recomputes_generated_digest() {
        let hasher = hasher();
        let salted = hasher.generate_salted_digest("secret").expect("Failed to hash");

        let recomputed = hasher.verify("secret", &salted.salt).expect("Failed to verify");
        assert!(digests_match(&recomputed, &salted.digest));
    }

    #[test]
    fn test_digest_is_not_plaintext() {
        let salted = hasher().generate_salted_digest("secret").unwrap();

        assert_ne!(salted.digest, "secret");
        assert!(salted.digest.starts_with("$2b$04$"));
        assert_eq!(salted.salt.len(), SALT_BYTES * 2);
    }

    #[test]
    fn test_different_passwords_same_salt_differ() {
        let hasher = hasher();
        let salted = hasher.generate_salted_digest("first").unwrap();

        let other = hasher.verify("second", &salted.salt).unwrap();
        assert!(!digests_match(&other, &salted.digest));
    }

    #[test]
    fn test_bytes_past_seventy_two_still_count() {
        let hasher = hasher();
        let prefix = "a".repeat(72);
        let salted = hasher
            .generate_salted_digest(&format!("{}correct-tail", prefix))
            .unwrap();

        let wrong = hasher
            .verify(&format!("{}WRONG", prefix), &salted.salt)
            .unwrap();
        assert!(!digests_match(&wrong, &salted.digest));

        let right = hasher
            .verify(&format!("{}correct-tail", prefix), &salted.salt)
            .unwrap();
        assert!(digests_match(&right, &salted.digest));
    }

    #[test]
    fn test_prehash_has_fixed_length() {
        assert_eq!(prehash("").len(), 64);
        assert_eq!(prehash(&"x".repeat(500)).len(), 64);
        assert_ne!(prehash("a"), prehash("b"));
    }

    #[test]
    fn test_same_password_different_salts_differ() {
        let hasher = hasher();
        let a = hasher.generate_salted_digest("pw").unwrap();
        let b = hasher.generate_salted_digest("pw").unwrap();

        assert_ne!(a.salt, b.salt);
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn test_empty_plaintext_is_deterministic() {
        let hasher = hasher();
        let salted = hasher.generate_salted_digest("").unwrap();

        assert_eq!(hasher.verify("", &salted.salt).unwrap(), salted.digest);
        assert_eq!(hasher.verify("", &salted.salt).unwrap(), salted.digest);
    }

    #[test]
    fn test_malformed_salt_is_hashing_error() {
        let result = hasher().verify("secret", "not-hex");
        assert!(matches!(result, Err(AuthError::Hashing(_))));

        let result = hasher().verify("secret", "abcd");
        assert!(matches!(result, Err(AuthError::Hashing(_))));
    }

    #[test]
    fn test_verify_against_uses_recorded_cost() {
        let salted = CredentialHasher::new(5).generate_salted_digest("secret").unwrap();
        let current = CredentialHasher::new(4);

        let attempt = current.verify_against("secret", &salted.salt, &salted.digest).unwrap();
        assert!(digests_match(&attempt, &salted.digest));

        let attempt = current.verify_against("wrong", &salted.salt, &salted.digest).unwrap();
        assert!(!digests_match(&attempt, &salted.digest));

        // The configured cost alone would not reproduce the stored digest.
        let attempt = current.verify("secret", &salted.salt).unwrap();
        assert!(!digests_match(&attempt, &salted.digest));
    }

    #[test]
    fn test_recorded_cost() {
        assert_eq!(recorded_cost("$2b$12$abcdefghijklmnopqrstuv"), Some(12));
        assert_eq!(recorded_cost("garbage"), None);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer"));
        assert!(constant_time_eq(b"", b""));
    }
}
