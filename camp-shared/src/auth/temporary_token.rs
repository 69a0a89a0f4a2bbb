/// Opaque single-use tokens
///
/// Email verification and password reset links carry a random token. Only
/// its SHA-256 digest is persisted, next to an expiry; presenting the
/// unhashed value later is checked by hashing it again and looking the
/// digest up. The hash is unsalted so the lookup is an equality match.
///
/// - **Entropy**: 20 random bytes, hex-encoded (40 characters)
/// - **Digest**: SHA-256, hex-encoded (64 characters)
/// - **Lifetime**: 20 minutes by default
///
/// # Example
///
/// ```
/// use camp_shared::auth::temporary_token::{hash_token, TemporaryToken, DEFAULT_TTL_MINUTES};
/// use chrono::Duration;
///
/// let token = TemporaryToken::generate(Duration::minutes(DEFAULT_TTL_MINUTES));
/// assert_eq!(token.unhashed.len(), 40);
/// assert_eq!(hash_token(&token.unhashed), token.digest.hash);
/// ```

use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::models::user::TokenDigest;

/// Number of random bytes in a token
pub const TOKEN_BYTES: usize = 20;

/// Default lifetime of a token, in minutes
pub const DEFAULT_TTL_MINUTES: i64 = 20;

/// A freshly generated token: the value to send and the form to persist
#[derive(Debug, Clone)]
pub struct TemporaryToken {
    /// Goes into the link; never stored
    pub unhashed: String,

    /// Goes into the store
    pub digest: TokenDigest,
}

impl TemporaryToken {
    /// Generates a token that expires `ttl` from now
    pub fn generate(ttl: Duration) -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let unhashed = hex::encode(bytes);

        let digest = TokenDigest {
            hash: hash_token(&unhashed),
            expires_at: Utc::now() + ttl,
        };

        Self { unhashed, digest }
    }
}

/// Hex-encoded SHA-256 of a token value
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compares two strings without short-circuiting on the first difference
///
/// Length is not hidden.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_shape() {
        let token = TemporaryToken::generate(Duration::minutes(DEFAULT_TTL_MINUTES));

        assert_eq!(token.unhashed.len(), TOKEN_BYTES * 2);
        assert!(token.unhashed.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(token.digest.hash.len(), 64);
        assert_ne!(token.digest.hash, token.unhashed);

        let remaining = token.digest.expires_at - Utc::now();
        assert!(remaining <= Duration::minutes(20));
        assert!(remaining > Duration::minutes(19));
    }

    #[test]
    fn test_tokens_are_random() {
        let a = TemporaryToken::generate(Duration::minutes(1));
        let b = TemporaryToken::generate(Duration::minutes(1));
        assert_ne!(a.unhashed, b.unhashed);
        assert_ne!(a.digest.hash, b.digest.hash);
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("token", "token"));
        assert!(!constant_time_eq("token", "tokem"));
        assert!(!constant_time_eq("token", "token2"));
        assert!(constant_time_eq("", ""));
    }
}
