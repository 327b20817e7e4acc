//! Opaque token generation for sessions and password reset links.
//!
//! Tokens leave the server exactly once (in a cookie or an emailed link);
//! only their SHA-256 hashes are handed to the backend.

use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Generate a random 32-byte token, hex encoded (64 characters).
pub fn token_generate() -> String {
    let mut rng = rand::rng();
    let token: [u8; 32] = rng.random();

    hex::encode(token)
}

/// Hash a token for storage (SHA-256, hex encoded).
pub fn token_hash_sha256(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a token together with its storage hash.
pub fn token_with_hash_generate() -> (String, String) {
    let token = token_generate();
    let hash = token_hash_sha256(&token);
    (token, hash)
}

/// Calculate an absolute expiry `ttl` from now, saturating on overflow.
pub fn token_expiry_calculate(ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token() {
        let token1 = token_generate();
        let token2 = token_generate();

        assert_ne!(token1, token2);
        assert_eq!(token1.len(), 64);
        assert!(token1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_token() {
        let (token, hash) = token_with_hash_generate();

        // Same token should produce same hash
        assert_eq!(hash, token_hash_sha256(&token));

        // Hash should be 64 characters (SHA-256 in hex)
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, token);
    }

    #[test]
    fn test_expiry_is_in_the_future() {
        let expires_at = token_expiry_calculate(Duration::from_secs(60));
        assert!(expires_at > Utc::now());
    }

    #[test]
    fn test_expiry_saturates() {
        let expires_at = token_expiry_calculate(Duration::MAX);
        assert_eq!(expires_at, DateTime::<Utc>::MAX_UTC);
    }
}
